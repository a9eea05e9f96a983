//! Value objects - immutable types defined by their values

mod email_address;
mod identifiers;
mod provider;

pub use email_address::EmailAddress;
pub use identifiers::{AccountId, EmailId, TeamId, UserId};
pub use provider::{EmailProvider, MailProtocol, ProviderPreset, ServerEndpoint};
