use paypal_service::config::{
    CacheSettings, CheckoutSettings, ObservabilitySettings, PayPalSettings, ServerSettings,
    Settings, SignatureSettings,
};
use paypal_service::startup::Application;
use rand::RngCore;
use secrecy::Secret;
use service_core::middleware::signature::{
    CLIENT_ID_HEADER, NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use service_core::utils::signature::generate_signature;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SIGNING_CLIENT_ID: &str = "shop-backend";
pub const SIGNING_SECRET: &str = "test-signing-secret";

pub const APPROVAL_URL: &str =
    "https://www.sandbox.paypal.com/cgi-bin/webscr?cmd=_express-checkout&token=EC-TEST";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub paypal: MockServer,
    /// Browser stand-in: keeps the session cookie, never follows redirects.
    pub browser: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let paypal = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scope": "https://api.paypal.com/v1/payments/.*",
                "access_token": "test-access-token",
                "token_type": "Bearer",
                "app_id": "APP-TEST",
                "expires_in": 28800
            })))
            .mount(&paypal)
            .await;

        let config = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
                public_url: "http://shop.test".to_string(),
            },
            paypal: PayPalSettings {
                endpoint: Some(paypal.uri()),
                client_id: Some("test-client-id".to_string()),
                client_secret: Some(Secret::new("test-client-secret".to_string())),
                currency: None,
                request_timeout_secs: 5,
            },
            checkout: CheckoutSettings {
                success_url: "/checkout/success".to_string(),
                cancel_url: "/checkout/cancelled".to_string(),
                stash_ttl_secs: 60,
            },
            cache: CacheSettings::default(),
            signature: SignatureSettings {
                enabled: true,
                client_id: Some(SIGNING_CLIENT_ID.to_string()),
                secret: Some(Secret::new(SIGNING_SECRET.to_string())),
                max_clock_skew_secs: 60,
            },
            observability: ObservabilitySettings::default(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let browser = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build browser client");

        // Wait for HTTP server to be ready by polling health endpoint
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if browser.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            paypal,
            browser,
        }
    }

    /// PayPal accepts payment creation and returns an approval link.
    pub async fn mock_payment_created(&self, payment_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/payments/payment"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": payment_id,
                "state": "created",
                "intent": "sale",
                "links": [
                    {
                        "href": format!("{}/v1/payments/payment/{}", self.paypal.uri(), payment_id),
                        "rel": "self",
                        "method": "GET"
                    },
                    { "href": APPROVAL_URL, "rel": "approval_url", "method": "REDIRECT" }
                ]
            })))
            .mount(&self.paypal)
            .await;
    }

    /// Signed checkout through the browser client so the session cookie sticks.
    pub async fn checkout(&self, body: serde_json::Value) -> reqwest::Response {
        self.signed_post("/checkout", Some(body))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// A POST carrying the merchant's HMAC headers over the exact body bytes.
    pub fn signed_post(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> reqwest::RequestBuilder {
        let bytes = body
            .map(|b| serde_json::to_vec(&b).expect("Body serializes"))
            .unwrap_or_default();

        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = hex::encode(nonce);
        let timestamp = chrono::Utc::now().timestamp();
        let signature =
            generate_signature(SIGNING_SECRET, "POST", path, timestamp, &nonce, &bytes)
                .expect("Failed to sign request");

        let mut request = self
            .browser
            .post(format!("{}{}", self.address, path))
            .header(CLIENT_ID_HEADER, SIGNING_CLIENT_ID)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(NONCE_HEADER, nonce)
            .header(SIGNATURE_HEADER, signature);
        if !bytes.is_empty() {
            request = request
                .header("content-type", "application/json")
                .body(bytes);
        }
        request
    }

    /// The path + query PayPal would send the buyer back to.
    pub async fn callback_path(&self, which: &str) -> String {
        let requests = self
            .paypal
            .received_requests()
            .await
            .expect("Request recording is enabled");
        let create = requests
            .iter()
            .rev()
            .find(|r| r.url.path() == "/v1/payments/payment")
            .expect("No payment was created");
        let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
        let url = body["redirect_urls"][which].as_str().unwrap();
        url.strip_prefix("http://shop.test")
            .expect("Callback is under the public URL")
            .to_string()
    }

    pub async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.browser
            .get(format!("{}{}", self.address, path_and_query))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
