/// HTML building blocks shared by the rendered pages and the emails

use chrono::{DateTime, Utc};

use crate::models::{Review, Tour, User};

/// Escape text for safe interpolation into HTML
pub fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrap an email body in the branded layout
pub fn email_layout(subject: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
    <title>{subject}</title>
  </head>
  <body style="background-color: #f6f6f6; font-family: sans-serif; font-size: 14px;">
    <table role="presentation" border="0" cellpadding="0" cellspacing="0" class="body">
      <tr>
        <td class="container" style="max-width: 580px; padding: 10px;">
          {body}
          <p>- Jonas Schmedtmann, CEO</p>
        </td>
      </tr>
    </table>
  </body>
</html>"#,
        subject = escape(subject),
        body = body,
    )
}

fn header(user: Option<&User>) -> String {
    let account = match user {
        Some(user) => format!(
            r#"<a class="nav__el nav__el--logout" href="/api/v1/users/logout">Log out</a>
        <a class="nav__el" href="/me"><img class="nav__user-img" src="/img/users/{photo}" alt="Photo of {name}" /><span>{first}</span></a>"#,
            photo = escape(&user.photo),
            name = escape(&user.name),
            first = escape(user.first_name()),
        ),
        None => r#"<a class="nav__el" href="/login">Log in</a>"#.to_string(),
    };

    format!(
        r#"<header class="header">
      <nav class="nav nav--tours"><a class="nav__el" href="/">All tours</a></nav>
      <div class="header__logo"><img src="/img/logo-white.png" alt="Natours logo" /></div>
      <nav class="nav nav--user">
        {account}
      </nav>
    </header>"#
    )
}

/// Full page around `body`; `alert` is shown as a banner
pub fn page(title: &str, user: Option<&User>, alert: Option<&str>, body: &str) -> String {
    let alert = alert
        .map(|message| format!(r#"<div class="alert alert--success">{}</div>"#, escape(message)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <link rel="stylesheet" href="/css/style.css" />
    <link rel="shortcut icon" type="image/png" href="/img/favicon.png" />
    <title>Natours | {title}</title>
  </head>
  <body>
    {header}
    {alert}
    <main class="main">
      {body}
    </main>
    <footer class="footer">
      <div class="footer__logo"><img src="/img/logo-green.png" alt="Natours logo" /></div>
      <p class="footer__copyright">&copy; Natours</p>
    </footer>
    <script src="/js/bundle.js"></script>
  </body>
</html>"#,
        title = escape(title),
        header = header(user),
    )
}

fn start_date(dates: &[DateTime<Utc>]) -> String {
    dates
        .first()
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_else(|| "To be announced".to_string())
}

fn tour_card(tour: &Tour) -> String {
    format!(
        r#"<div class="card">
        <div class="card__header">
          <img class="card__picture-img" src="/img/tours/{cover}" alt="{name}" />
          <h3 class="heading-tertirary"><span>{name}</span></h3>
        </div>
        <div class="card__details">
          <h4 class="card__sub-heading">{difficulty} {duration}-day tour</h4>
          <p class="card__text">{summary}</p>
          <div class="card__data"><span>{start}</span></div>
          <div class="card__data"><span>{size} people</span></div>
        </div>
        <div class="card__footer">
          <p><span class="card__footer-value">${price}</span> <span class="card__footer-text">per person</span></p>
          <p class="card__ratings"><span class="card__footer-value">{average}</span> <span class="card__footer-text">rating ({quantity})</span></p>
          <a class="btn btn--green btn--small" href="/tour/{slug}">Details</a>
        </div>
      </div>"#,
        cover = escape(&tour.image_cover),
        name = escape(&tour.name),
        difficulty = escape(&tour.difficulty),
        duration = tour.duration,
        summary = escape(&tour.summary),
        start = start_date(&tour.start_dates),
        size = tour.max_group_size,
        price = tour.price,
        average = tour.ratings_average,
        quantity = tour.ratings_quantity,
        slug = escape(&tour.slug),
    )
}

/// Card grid of `tours`
pub fn overview(tours: &[Tour]) -> String {
    let cards: String = tours.iter().map(tour_card).collect();
    format!(r#"<div class="card-container">{}</div>"#, cards)
}

fn review_card(review: &Review) -> String {
    let stars: String = (1..=5)
        .map(|star| {
            let state = if review.rating >= star { "active" } else { "inactive" };
            format!(r#"<span class="reviews__star reviews__star--{}">&#9733;</span>"#, state)
        })
        .collect();

    format!(
        r#"<div class="reviews__card">
        <div class="reviews__avatar">
          <img class="reviews__avatar-img" src="/img/users/{photo}" alt="{name}" />
          <h6 class="reviews__user">{name}</h6>
        </div>
        <p class="reviews__text">{text}</p>
        <div class="reviews__rating">{stars}</div>
      </div>"#,
        photo = escape(&review.user_photo),
        name = escape(&review.user_name),
        text = escape(&review.review),
    )
}

/// Detail page of one tour with its reviews and the booking button
pub fn tour_detail(tour: &Tour, reviews: &[Review], user: Option<&User>) -> String {
    let images: String = tour
        .images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            format!(
                r#"<div class="picture-box"><img class="picture-box__img" src="/img/tours/{}" alt="{} Tour {}" /></div>"#,
                escape(image),
                escape(&tour.name),
                i + 1
            )
        })
        .collect();
    let reviews: String = reviews.iter().map(review_card).collect();
    let cta = match user {
        Some(_) => format!(
            r#"<button class="btn btn--green span-all-rows" id="book-tour" data-tour-id="{}">Book tour now!</button>"#,
            tour.id
        ),
        None => r#"<a class="btn btn--green span-all-rows" href="/login">Log in to book tour</a>"#
            .to_string(),
    };

    format!(
        r#"<section class="section-header">
        <div class="header__hero"><img class="header__hero-img" src="/img/tours/{cover}" alt="{name}" /></div>
        <div class="heading-box"><h1 class="heading-primary"><span>{name} tour</span></h1>
          <div class="heading-box__group"><span class="heading-box__text">{duration} days</span></div>
        </div>
      </section>
      <section class="section-description">
        <div class="overview-box">
          <div class="overview-box__detail"><span class="overview-box__label">Next date</span><span class="overview-box__text">{start}</span></div>
          <div class="overview-box__detail"><span class="overview-box__label">Difficulty</span><span class="overview-box__text">{difficulty}</span></div>
          <div class="overview-box__detail"><span class="overview-box__label">Participants</span><span class="overview-box__text">{size} people</span></div>
          <div class="overview-box__detail"><span class="overview-box__label">Rating</span><span class="overview-box__text">{average} / 5</span></div>
        </div>
        <div class="description-box"><h2 class="heading-secondary ma-bt-lg">About {name} tour</h2>
          <p class="description__text">{description}</p>
        </div>
      </section>
      <section class="section-pictures">{images}</section>
      <section class="section-reviews"><div class="reviews">{reviews}</div></section>
      <section class="section-cta">
        <div class="cta">
          <div class="cta__content">
            <h2 class="heading-secondary">What are you waiting for?</h2>
            <p class="cta__text">{duration} days. 1 adventure. Infinite memories. Make it yours today!</p>
            {cta}
          </div>
        </div>
      </section>"#,
        cover = escape(&tour.image_cover),
        name = escape(&tour.name),
        duration = tour.duration,
        start = start_date(&tour.start_dates),
        difficulty = escape(&tour.difficulty),
        size = tour.max_group_size,
        average = tour.ratings_average,
        description = escape(&tour.description),
    )
}

pub fn login_form() -> String {
    r#"<div class="login-form">
        <h2 class="heading-secondary ma-bt-lg">Log into your account</h2>
        <form class="form form--login">
          <div class="form__group">
            <label class="form__label" for="email">Email address</label>
            <input class="form__input" id="email" type="email" placeholder="you@example.com" required />
          </div>
          <div class="form__group ma-bt-md">
            <label class="form__label" for="password">Password</label>
            <input class="form__input" id="password" type="password" placeholder="••••••••" required minlength="8" />
          </div>
          <div class="form__group"><button class="btn btn--green">Login</button></div>
        </form>
      </div>"#
        .to_string()
}

/// Account settings; the plain form posts to `/submit-user-data`
pub fn account(user: &User) -> String {
    format!(
        r#"<div class="user-view">
        <nav class="user-view__menu">
          <ul class="side-nav">
            <li class="side-nav--active"><a href="/me">Settings</a></li>
            <li><a href="/my-tours">My bookings</a></li>
          </ul>
        </nav>
        <div class="user-view__content">
          <div class="user-view__form-container">
            <h2 class="heading-secondary ma-bt-md">Your account settings</h2>
            <form class="form form-user-data" action="/submit-user-data" method="POST">
              <div class="form__group">
                <label class="form__label" for="name">Name</label>
                <input class="form__input" id="name" type="text" name="name" value="{name}" required />
              </div>
              <div class="form__group ma-bt-md">
                <label class="form__label" for="email">Email address</label>
                <input class="form__input" id="email" type="email" name="email" value="{email}" required />
              </div>
              <div class="form__group form__photo-upload">
                <img class="form__user-photo" src="/img/users/{photo}" alt="User photo" />
                <input class="form__upload" type="file" accept="image/*" id="photo" name="photo" />
                <label for="photo">Choose new photo</label>
              </div>
              <div class="form__group right"><button class="btn btn--small btn--green">Save settings</button></div>
            </form>
          </div>
          <div class="line">&nbsp;</div>
          <div class="user-view__form-container">
            <h2 class="heading-secondary ma-bt-md">Password change</h2>
            <form class="form form-user-password">
              <div class="form__group">
                <label class="form__label" for="password-current">Current password</label>
                <input class="form__input" id="password-current" type="password" required minlength="8" />
              </div>
              <div class="form__group">
                <label class="form__label" for="password">New password</label>
                <input class="form__input" id="password" type="password" required minlength="8" />
              </div>
              <div class="form__group ma-bt-lg">
                <label class="form__label" for="password-confirm">Confirm password</label>
                <input class="form__input" id="password-confirm" type="password" required minlength="8" />
              </div>
              <div class="form__group right"><button class="btn btn--small btn--green btn--save-password">Save password</button></div>
            </form>
          </div>
        </div>
      </div>"#,
        name = escape(&user.name),
        email = escape(&user.email),
        photo = escape(&user.photo),
    )
}

pub fn error_message(message: &str) -> String {
    format!(
        r#"<div class="error">
        <div class="error__title">
          <h2 class="heading-secondary heading-secondary--error">Uh oh! Something went wrong!</h2>
        </div>
        <div class="error__msg">{}</div>
      </div>"#,
        escape(message)
    )
}
