//! ModSecurity web application firewall module for Apache httpd.
//!
//! The module binds to exactly one server: an explicit `homebrew-httpd22`
//! or `homebrew-httpd24`, else httpd24 on newer hosts, else the server the
//! operating system ships.

use crate::build::BuildCommand;
use crate::configure::{ConfigureTemplate, Insert};
use crate::deps::{Advisory, Candidate, DependencySlot, Necessity, Requirement};
use crate::layout::{Anchor, LayoutEntry, LayoutSpec};
use crate::options::BuildOption;
use crate::patch::{PatchPhase, PatchRule};
use crate::platform::OsVersion;
use crate::predicate::Predicate;
use crate::recipe::{Caveat, Recipe};

use super::host_variants;

/// From this release on, the package-manager apr and httpd24 are the
/// defaults instead of the system copies.
pub const HOST_DEFAULT_THRESHOLD: OsVersion = OsVersion::SIERRA;

/// Below this release, building against the system server needs the
/// command-line tools.
pub const TOOLCHAIN_THRESHOLD: OsVersion = OsVersion::SIERRA;

const CONFIG_SAMPLE: &str = "modsecurity.conf-recommended";

const CLT_MESSAGE: &str = "\
Xcode Command Line Tools required, even if Xcode is installed, on OS X 10.9 or
10.10 and not using Homebrew httpd22 or httpd24. Resolve by running
  xcode-select --install";

const SETUP_CAVEAT: &str = "\
You must manually edit {{apache_configdir}}/httpd.conf to include
  LoadModule security2_module {{libexecdir}}/mod_security2.so

You must also uncomment a line similar to the line below in {{apache_configdir}}/httpd.conf to enable unique_id_module
  #LoadModule unique_id_module libexec/mod_unique_id.so

Sample configuration file for Apache is at:
  {{prefix}}/modsecurity.conf-recommended

NOTE: If you're _NOT_ using --with-homebrew-httpd22 or --with-homebrew-httpd24 and having
installation problems relating to a missing `cc` compiler and `OSX{{os_version}}.xctoolchain`,
read the \"Troubleshooting\" section of https://github.com/Homebrew/homebrew-apache";

fn binds_httpd22() -> Predicate {
    Predicate::option("homebrew-httpd22")
}

fn binds_httpd24() -> Predicate {
    Predicate::Any(vec![
        Predicate::option("homebrew-httpd24"),
        Predicate::OsAtLeast(HOST_DEFAULT_THRESHOLD),
    ])
}

fn uses_packaged_apr() -> Predicate {
    Predicate::Any(vec![
        Predicate::option("homebrew-httpd22"),
        Predicate::option("homebrew-httpd24"),
        Predicate::option("homebrew-apr"),
        Predicate::OsAtLeast(HOST_DEFAULT_THRESHOLD),
    ])
}

pub fn mod_security() -> Recipe {
    let mut recipe = Recipe::new("mod_security", "2.9.2", "2.9");
    recipe.description = "Open Source Web application firewall".to_string();
    recipe.homepage = "https://www.modsecurity.org/".to_string();

    recipe.options = vec![
        BuildOption::new("homebrew-apr", "Use Homebrew apr"),
        BuildOption::new("homebrew-httpd22", "Use Homebrew Apache httpd 2.2"),
        BuildOption::new("homebrew-httpd24", "Use Homebrew Apache httpd 2.4"),
        BuildOption::alias("brewed-apr", "homebrew-apr"),
        BuildOption::alias("brewed-httpd22", "homebrew-httpd22"),
        BuildOption::alias("brewed-httpd24", "homebrew-httpd24"),
    ];
    recipe.conflicts = host_variants().binding_rules();

    recipe.requirements = vec![Requirement {
        name: "command-line tools".to_string(),
        applies: Predicate::All(vec![
            Predicate::not(Predicate::option("homebrew-httpd22")),
            Predicate::not(Predicate::option("homebrew-httpd24")),
            Predicate::OsBelow(TOOLCHAIN_THRESHOLD),
        ]),
        satisfied: Predicate::Any(vec![
            Predicate::OsBelow(OsVersion::MAVERICKS),
            Predicate::ToolchainPresent,
        ]),
        message: CLT_MESSAGE.to_string(),
    }];

    recipe.advisories = vec![Advisory {
        when: Predicate::All(vec![
            Predicate::option("homebrew-apr"),
            Predicate::Any(vec![
                Predicate::option("homebrew-httpd22"),
                Predicate::option("homebrew-httpd24"),
                Predicate::OsAtLeast(HOST_DEFAULT_THRESHOLD),
            ]),
        ]),
        message: "Ignoring --with-homebrew-apr: homebrew apr included in httpd22 and httpd24"
            .to_string(),
    }];

    recipe.slots = vec![
        DependencySlot::new("apr", Necessity::Required)
            .candidate(Candidate::package(uses_packaged_apr(), "apr"))
            .candidate(Candidate::system("/usr/bin")),
        DependencySlot::new("apu", Necessity::Required)
            .probe(&["bin"])
            .candidate(Candidate::package(uses_packaged_apr(), "apr-util"))
            .candidate(Candidate::system("/usr/bin")),
        DependencySlot::new("apxs", Necessity::Required)
            .probe(&["sbin/apxs", "bin/apxs"])
            .candidate(
                Candidate::package(binds_httpd22(), "httpd22")
                    .export("apache_configdir", "{{etc}}/apache2/2.2"),
            )
            .candidate(
                Candidate::package(binds_httpd24(), "httpd24")
                    .export("apache_configdir", "{{etc}}/apache2/2.4"),
            )
            .candidate(
                Candidate::system("/usr/sbin/apxs").export("apache_configdir", "/etc/apache2"),
            ),
        DependencySlot::required("pcre", "pcre"),
        DependencySlot::new("curl", Necessity::WhenSelected)
            .candidate(Candidate::package(Predicate::OsAtMost(OsVersion::MAVERICKS), "curl")),
    ];

    recipe.configure = ConfigureTemplate::new(vec![
        Insert::base(&["--prefix={{prefix}}", "--disable-dependency-tracking"]),
        Insert::dependency("pcre", &["--with-pcre={{path}}"]),
        Insert::dependency("apxs", &["--with-apxs={{path}}"]),
        Insert::dependency("apr", &["--with-apr={{path}}"]),
        Insert::dependency("apu", &["--with-apu={{path}}"]),
        Insert::dependency("curl", &["--with-curl={{path}}"]),
    ]);

    recipe.layout = LayoutSpec {
        entries: vec![
            LayoutEntry::anchored("prefix", Anchor::Keg, ""),
            LayoutEntry::under("libexecdir", "prefix", "libexec"),
            LayoutEntry::anchored("opt_prefix", Anchor::Opt, ""),
            LayoutEntry::anchored("etc", Anchor::Etc, ""),
            LayoutEntry::anchored("var", Anchor::Var, ""),
        ],
        ..Default::default()
    };

    recipe.patches = vec![
        PatchRule::new(CONFIG_SAMPLE, " /var/log", " {{var}}/log", PatchPhase::AfterBuild)
            .mandatory(),
        PatchRule::new(
            CONFIG_SAMPLE,
            " /opt/modsecurity/var",
            " {{opt_prefix}}/var",
            PatchPhase::AfterBuild,
        )
        .mandatory(),
    ];

    recipe.build = vec![
        BuildCommand::run("./autogen.sh", &[]),
        BuildCommand::Configure,
        BuildCommand::make(),
    ];
    recipe.install = vec![
        BuildCommand::install("apache2/.libs/mod_security2.so", "libexecdir"),
        BuildCommand::install(CONFIG_SAMPLE, "prefix"),
    ];

    recipe.caveats = vec![Caveat::always(SETUP_CAVEAT)];
    recipe
}
