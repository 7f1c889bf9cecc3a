pub mod attribution;
pub mod budget_item;
pub mod guest;
pub mod preference;
pub mod rsvp_settings;
pub mod user;
pub mod vendor;
pub mod wedding;

pub use attribution::Attribution;
pub use budget_item::BudgetItem;
pub use guest::Guest;
pub use preference::Preference;
pub use rsvp_settings::RsvpSettings;
pub use user::User;
pub use vendor::Vendor;
pub use wedding::Wedding;
