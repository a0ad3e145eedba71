pub mod deprovision;
pub mod invitation;

pub use deprovision::{DeletionSummary, DeprovisionService};
pub use invitation::{InvitationService, IssuedInvitation, ProvisionedDriver};
