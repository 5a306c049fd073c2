pub mod auth;
pub mod caldav;
pub mod contract;
pub mod error;
pub mod google;
pub mod microsoft;
pub mod registry;

pub use auth::{AccessToken, BasicCredentials, CredentialStore, TokenSource};
pub use caldav::CalDavAdapter;
pub use contract::{BidirectionalProvider, CalendarImporter, CalendarSyncer, PushOutcome};
pub use error::{ProviderError, ProviderResult};
pub use google::GoogleCalendarAdapter;
pub use microsoft::MicrosoftCalendarAdapter;
pub use registry::ProviderRegistry;
