//! Rate limiting logic and counter storage.

mod backend;
pub mod clock;
mod limiter;
mod memory;
mod methods;
mod quota;
mod request;
mod store;
mod vary;

pub use backend::{ErrorPolicy, Limiter};
pub use limiter::RateLimiter;
pub use memory::MemoryStore;
pub use methods::MethodFilter;
pub use quota::Quota;
pub use request::{RequestInfo, RequestRecord};
pub use store::{CounterStore, StoreError, TimeoutStore, WindowState};
pub use vary::{ByClientAddress, ByPathAndClientAddress, KeyPolicy, KeyPolicyKind};
