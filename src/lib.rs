//! Build-configuration resolver for Apache httpd and its modules
//!
//! A recipe maps user-chosen build options plus the host platform onto a
//! validated build configuration: normalized options, a dependency
//! selection, ordered configure arguments, an install-path layout,
//! idempotent file patches and a launchd service descriptor. The external
//! build step (configure, make) is run by a [`build::BuildStep`].
//!
//! # Example
//!
//! ```no_run
//! use httpd_recipes::deps::StaticLookup;
//! use httpd_recipes::notice::Notice;
//! use httpd_recipes::options::RequestedOptions;
//! use httpd_recipes::platform::{OsVersion, PlatformContext};
//! use httpd_recipes::recipes;
//! use httpd_recipes::resolver::{resolve, Host};
//!
//! let lookup = StaticLookup::installed_under(
//!     "/usr/local",
//!     &["apr", "apr-util", "pcre", "openssl", "zlib", "nghttp2"],
//! );
//! let host = Host {
//!     platform: PlatformContext::new(OsVersion::SIERRA, true),
//!     lookup: &lookup,
//!     root: "/usr/local".into(),
//!     jobs: 4,
//! };
//! let request = RequestedOptions::parse_flags(&["--with-mpm-event", "--with-privileged-ports"]);
//! let resolved = resolve(&recipes::httpd24(), &request, &host, &mut Vec::<Notice>::new())?;
//! assert!(resolved.configure_args.contains(&"--with-mpm=event".to_string()));
//! # Ok::<(), httpd_recipes::ResolveError>(())
//! ```
//!
//! # Recipes
//!
//! - `httpd22`, `httpd24`: the two server majors. They conflict with each
//!   other and share one [`conflicts::VariantGroup`].
//! - `mod_security`: binds to exactly one server, chosen by option or by
//!   platform version.
//!
//! # Options
//!
//! Flags are given as `--with-<name>`, `--without-<name>` or bare names.
//! Deprecated names (`http2`, `brewed-*`) resolve to their canonical option
//! and produce a [`notice::Notice::Deprecated`].

pub mod build;
pub mod config;
pub mod configure;
pub mod conflicts;
pub mod deps;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod notice;
pub mod options;
pub mod output;
pub mod patch;
pub mod platform;
pub mod predicate;
pub mod recipe;
pub mod recipes;
pub mod resolver;
pub mod service;
pub mod util;

pub use error::ResolveError;
pub use recipe::Recipe;
pub use resolver::{resolve, ResolvedBuildConfiguration};
