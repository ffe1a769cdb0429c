//! Manufacturer Policy Registry
//!
//! Maps a device manufacturer string to a [`ManufacturerProfile`]: how often
//! to check liveness, how many recovery attempts to make, how loudly to alert
//! and what the user has to change in the vendor's settings to keep the
//! worker alive.
//!
//! The tuning encodes how aggressively each vendor's background-process
//! killer behaves in the field. Lookup is pure and infallible: anything not
//! recognised gets the [`Vendor::Generic`] profile.

mod profiles;

pub use profiles::{AlertUrgency, ManufacturerProfile, Vendor};
