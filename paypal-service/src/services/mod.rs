pub mod cache;
pub mod gateway;
pub mod metrics;
pub mod paypal;
pub mod session;
pub mod stash;

pub use cache::{KeyValueCache, MemoryCache, RedisCache};
pub use gateway::{CheckoutHooks, GatewayOutcome, PaymentGateway, RedirectHooks};
pub use metrics::{get_metrics, init_metrics};
pub use paypal::PayPalClient;
pub use session::SessionStore;
pub use stash::LocalStash;
