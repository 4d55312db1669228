/// Hosted checkout sessions at the payment provider
///
/// Sessions are created with a form encoded POST to
/// `{api_base_url}/v1/checkout/sessions`, authenticated with the secret key.

use serde::{Deserialize, Serialize};

use crate::configuration::PaymentSettings;
use crate::error::PaymentError;
use crate::models::{Tour, User};

/// What the provider returns for a created session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
pub struct CheckoutClient {
    http_client: reqwest::Client,
    api_base_url: String,
    secret_key: String,
    currency: String,
}

/// Everything needed to build the session for one tour and customer
pub struct CheckoutRequest<'a> {
    pub tour: &'a Tour,
    pub user: &'a User,
    /// Public base url of the site, used for redirects and image links
    pub base_url: &'a str,
}

impl CheckoutRequest<'_> {
    pub fn success_url(&self) -> String {
        format!(
            "{}/?tour={}&user={}&price={}",
            self.base_url, self.tour.id, self.user.id, self.tour.price
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/tour/{}", self.base_url, self.tour.slug)
    }

    /// Form fields in the provider's bracket notation
    pub fn form_fields(&self, currency: &str) -> Vec<(String, String)> {
        let amount = (self.tour.price * 100.0).round() as i64;
        vec![
            ("payment_method_types[0]".into(), "card".into()),
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url()),
            ("cancel_url".into(), self.cancel_url()),
            ("customer_email".into(), self.user.email.clone()),
            ("client_reference_id".into(), self.tour.id.to_string()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), currency.to_string()),
            ("line_items[0][price_data][unit_amount]".into(), amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]".into(),
                format!("{} Tour", self.tour.name),
            ),
            (
                "line_items[0][price_data][product_data][description]".into(),
                self.tour.summary.clone(),
            ),
            (
                "line_items[0][price_data][product_data][images][0]".into(),
                format!("{}/img/tours/{}", self.base_url, self.tour.image_cover),
            ),
        ]
    }
}

impl CheckoutClient {
    pub fn new(settings: &PaymentSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            currency: settings.currency.clone(),
        }
    }

    pub async fn create_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&request.form_fields(&self.currency))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Checkout request failed: {}", e);
                PaymentError::RequestFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Payment provider rejected checkout");
            return Err(PaymentError::Rejected(format!("{}: {}", status, body)));
        }

        let session = response.json::<CheckoutSession>().await.map_err(|e| {
            PaymentError::RequestFailed(format!("Invalid checkout session response: {}", e))
        })?;

        tracing::info!(session_id = %session.id, tour_id = %request.tour.id, "Checkout session created");
        Ok(session)
    }
}
