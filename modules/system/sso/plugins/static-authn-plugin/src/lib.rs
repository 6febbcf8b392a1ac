#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static SSO authentication plugin
//!
//! Authentication handlers backed by accounts listed in configuration, for
//! development, demos and tests.
//!
//! ## Handlers
//!
//! - **password** (`static` by default): validates username/password
//!   credentials against the configured accounts. Passwords are stored in
//!   plain text or as hex-encoded SHA-256 digests. Each account carries a
//!   status, so disabled, locked or expired accounts can be exercised.
//!
//! - **one-time code** (`otp` by default, optional): validates single-use
//!   codes per user. Runs in `standby` state unless configured otherwise, so
//!   it only takes part when a registered service requires it.
//!
//! ## Configuration
//!
//! ```yaml
//! plugins:
//!   static_sso_authn:
//!     password:
//!       name: static
//!       encoding: sha256
//!     users:
//!       casuser:
//!         # sha256("Mellon")
//!         password: "c58557fcfe37300200790917ea2cb9b27a015de83d02297f80d84fbe9caa44f9"
//!         attributes:
//!           mail: ["casuser@example.org"]
//!       former:
//!         password: "..."
//!         status: disabled
//!     one_time_code:
//!       codes:
//!         casuser: ["314159", "271828"]
//! ```

pub mod config;
pub mod domain;
pub mod module;

pub use module::StaticSsoAuthnPlugin;
