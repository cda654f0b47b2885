//! Resolution scenarios and cross-module properties
//!
//! These run the full pipeline through the public API with in-memory
//! dependency lookups.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use httpd_recipes::build::RecordingBuildStep;
use httpd_recipes::configure::Insert;
use httpd_recipes::deps::{DependencyLookup, StaticLookup};
use httpd_recipes::notice::Notice;
use httpd_recipes::options::RequestedOptions;
use httpd_recipes::patch::{PatchPhase, PatchSet};
use httpd_recipes::platform::{OsVersion, PlatformContext};
use httpd_recipes::recipes;
use httpd_recipes::resolver::{resolve, Host};
use httpd_recipes::{lifecycle, Recipe, ResolveError, ResolvedBuildConfiguration};
use tempfile::TempDir;

const ROOT: &str = "/usr/local";
const EL_CAPITAN: OsVersion = OsVersion::new(10, 11, 6);
const SOURCE_FILES: [&str; 4] = [
    "Makefile.in",
    "support/Makefile.in",
    "support/apachectl.in",
    "modsecurity.conf-recommended",
];

/// Counts lookups so tests can assert that validation ran first.
struct CountingLookup {
    inner: StaticLookup,
    calls: Cell<usize>,
}

impl CountingLookup {
    fn new(inner: StaticLookup) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }
}

impl DependencyLookup for CountingLookup {
    fn lookup(&self, provider: &str) -> Option<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        self.inner.lookup(provider)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}

fn everything_installed() -> StaticLookup {
    StaticLookup::installed_under(
        ROOT,
        &[
            "apr", "apr-util", "pcre", "openssl", "zlib", "nghttp2", "curl", "httpd22", "httpd24",
        ],
    )
    .with_file("/usr/local/opt/apr-util/bin")
    .with_file("/usr/local/opt/httpd22/sbin/apxs")
    .with_file("/usr/local/opt/httpd24/bin/apxs")
}

fn run(
    recipe: &Recipe,
    request: RequestedOptions,
    os: OsVersion,
    lookup: &dyn DependencyLookup,
) -> (Result<ResolvedBuildConfiguration, ResolveError>, Vec<Notice>) {
    let host = Host {
        platform: PlatformContext::new(os, true),
        lookup,
        root: PathBuf::from(ROOT),
        jobs: 4,
    };
    let mut notices: Vec<Notice> = Vec::new();
    let result = resolve(recipe, &request, &host, &mut notices);
    (result, notices)
}

fn has(args: &[String], arg: &str) -> bool {
    args.iter().any(|a| a == arg)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_a_defaults_below_threshold() {
    let lookup = everything_installed();

    let (httpd22, _) = run(&recipes::httpd22(), RequestedOptions::new(), EL_CAPITAN, &lookup);
    let (httpd24, _) = run(
        &recipes::httpd24(),
        RequestedOptions::new().without("nghttp2"),
        EL_CAPITAN,
        &lookup,
    );

    for resolved in [httpd22.unwrap(), httpd24.unwrap()] {
        let args = &resolved.configure_args;
        assert!(has(args, "--with-port=8080"), "{args:?}");
        assert!(has(args, "--with-sslport=8443"));
        assert!(has(args, "--with-mpm=prefork"));
        assert!(!args.iter().any(|a| a.contains("http2")));
        assert!(!resolved.service.unwrap().auto_start);
    }
}

#[test]
fn scenario_b_privileged_ports() {
    let lookup = everything_installed();
    for recipe in [recipes::httpd22(), recipes::httpd24()] {
        let (resolved, _) = run(
            &recipe,
            RequestedOptions::parse_flags(&["--with-privileged-ports"]),
            EL_CAPITAN,
            &lookup,
        );
        let resolved = resolved.unwrap();
        assert!(has(&resolved.configure_args, "--with-port=80"));
        assert!(has(&resolved.configure_args, "--with-sslport=443"));
        assert!(!has(&resolved.configure_args, "--with-port=8080"));

        let service = resolved.service.unwrap();
        assert!(service.auto_start);
        assert!(service.run_at_load);
        assert!(resolved.caveats.iter().any(|c| c.contains("/Library/LaunchDaemons")));
    }
}

#[test]
fn scenario_c_two_process_models() {
    for recipe in [recipes::httpd22(), recipes::httpd24()] {
        let lookup = CountingLookup::new(everything_installed());
        let (result, _) = run(
            &recipe,
            RequestedOptions::new().with("mpm-worker").with("mpm-event"),
            EL_CAPITAN,
            &lookup,
        );
        match result.unwrap_err() {
            ResolveError::Conflict { options, .. } => {
                assert_eq!(options, vec!["mpm-worker", "mpm-event"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(lookup.calls.get(), 0);
    }
}

#[test]
fn scenario_d_module_bound_to_both_hosts() {
    for flags in [
        ["with-homebrew-httpd22", "with-homebrew-httpd24"],
        ["with-brewed-httpd22", "with-homebrew-httpd24"],
    ] {
        let lookup = CountingLookup::new(everything_installed());
        let (result, _) = run(
            &recipes::mod_security(),
            RequestedOptions::parse_flags(&flags),
            OsVersion::SIERRA,
            &lookup,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, ResolveError::Conflict { .. }));
        assert!(err.to_string().contains("httpd22 and httpd24"));
        assert_eq!(lookup.calls.get(), 0);
    }
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn process_model_conflict_with_any_other_options() {
    let extras: [&[&str]; 4] = [
        &[],
        &["ldap"],
        &["privileged-ports"],
        &["ldap", "privileged-ports"],
    ];
    for extra in extras {
        let mut request = RequestedOptions::new().with("mpm-event").with("mpm-worker");
        for option in extra {
            request = request.with(*option);
        }
        let lookup = CountingLookup::new(StaticLookup::new());
        let (result, _) = run(&recipes::httpd24(), request, EL_CAPITAN, &lookup);
        assert!(matches!(result, Err(ResolveError::Conflict { .. })));
        assert_eq!(lookup.calls.get(), 0);
    }
}

#[test]
fn version_gated_defaults_are_monotonic() {
    let lookup = everything_installed();
    let providers = |os: OsVersion| -> Vec<String> {
        let (resolved, _) = run(&recipes::mod_security(), RequestedOptions::new(), os, &lookup);
        resolved
            .unwrap()
            .dependencies
            .into_iter()
            .map(|d| d.provider)
            .collect()
    };

    let below: Vec<_> = [OsVersion::new(10, 10, 0), EL_CAPITAN]
        .into_iter()
        .map(providers)
        .collect();
    let above: Vec<_> = [
        OsVersion::SIERRA,
        OsVersion::new(10, 13, 6),
        OsVersion::new(10, 14, 0),
        OsVersion::new(11, 2, 0),
    ]
    .into_iter()
    .map(providers)
    .collect();

    assert!(below.windows(2).all(|w| w[0] == w[1]));
    assert!(above.windows(2).all(|w| w[0] == w[1]));
    assert!(below[0].contains(&"system:/usr/sbin/apxs".to_string()));
    assert!(above[0].contains(&"httpd24".to_string()));

    // the server recipes have no version gate at all
    for recipe in [recipes::httpd22(), recipes::httpd24()] {
        let a = run(&recipe, RequestedOptions::new(), EL_CAPITAN, &lookup).0.unwrap();
        let b = run(&recipe, RequestedOptions::new(), OsVersion::new(10, 14, 0), &lookup)
            .0
            .unwrap();
        assert_eq!(a.dependencies, b.dependencies);
        assert_eq!(a.configure_args, b.configure_args);
    }
}

#[test]
fn explicit_option_beats_version_gate() {
    let lookup = everything_installed();
    let (resolved, _) = run(
        &recipes::mod_security(),
        RequestedOptions::new().with("homebrew-httpd22"),
        OsVersion::new(10, 13, 0),
        &lookup,
    );
    let resolved = resolved.unwrap();
    assert!(has(&resolved.configure_args, "--with-apxs=/usr/local/opt/httpd22/sbin/apxs"));
    assert!(resolved.caveats[0].contains("/usr/local/etc/apache2/2.2/httpd.conf"));
}

#[test]
fn dependency_flag_iff_slot_resolved() {
    let without_optional =
        StaticLookup::installed_under(ROOT, &["apr", "apr-util", "pcre", "openssl", "zlib"]);
    let all = everything_installed();

    let cases: Vec<(Recipe, RequestedOptions, &StaticLookup)> = vec![
        (recipes::httpd24(), RequestedOptions::new(), &all),
        (recipes::httpd24(), RequestedOptions::new(), &without_optional),
        (recipes::httpd24(), RequestedOptions::new().without("nghttp2"), &all),
        (recipes::httpd22(), RequestedOptions::new(), &all),
        (recipes::httpd22(), RequestedOptions::new().with("pcre"), &all),
    ];

    for (recipe, request, lookup) in cases {
        let (resolved, _) = run(&recipe, request, EL_CAPITAN, lookup);
        let resolved = resolved.unwrap();

        for insert in &recipe.configure.inserts {
            let Insert::Dependency { slot, args } = insert else {
                continue;
            };
            let present = resolved.dependencies.iter().any(|d| &d.slot == slot);
            for template in args {
                let key = template.split('=').next().unwrap_or(template);
                let emitted = resolved
                    .configure_args
                    .iter()
                    .any(|a| a.split('=').next() == Some(key));
                assert_eq!(emitted, present, "{}: {} for slot {}", recipe.name, key, slot);
            }
        }
    }
}

#[test]
fn missing_recommended_dependency_warns() {
    let lookup =
        StaticLookup::installed_under(ROOT, &["apr", "apr-util", "pcre", "openssl", "zlib"]);
    let (resolved, notices) =
        run(&recipes::httpd24(), RequestedOptions::new(), EL_CAPITAN, &lookup);
    let resolved = resolved.unwrap();
    assert!(!resolved.configure_args.iter().any(|a| a.contains("http2")));
    assert!(matches!(notices.as_slice(), [Notice::Advisory(msg)] if msg.contains("nghttp2")));
}

#[test]
fn missing_required_dependency_fails() {
    let lookup = StaticLookup::installed_under(ROOT, &["apr", "apr-util", "openssl", "zlib"]);
    let (result, _) = run(&recipes::httpd24(), RequestedOptions::new(), EL_CAPITAN, &lookup);
    assert!(matches!(
        result,
        Err(ResolveError::DependencyNotFound { slot, .. }) if slot == "pcre"
    ));
}

#[test]
fn toolchain_requirement() {
    let lookup = everything_installed();
    let host = Host {
        platform: PlatformContext::new(OsVersion::new(10, 10, 5), false),
        lookup: &lookup,
        root: PathBuf::from(ROOT),
        jobs: 1,
    };
    let err = resolve(
        &recipes::mod_security(),
        &RequestedOptions::new(),
        &host,
        &mut Vec::<Notice>::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ResolveError::RequirementNotMet { .. }));
    assert!(err.to_string().contains("xcode-select --install"));

    // binding to a packaged server lifts the requirement
    let ok = resolve(
        &recipes::mod_security(),
        &RequestedOptions::new().with("homebrew-httpd24"),
        &host,
        &mut Vec::<Notice>::new(),
    );
    assert!(ok.is_ok());
}

#[test]
fn ignored_apr_option_is_advised() {
    let lookup = everything_installed();
    let (resolved, notices) = run(
        &recipes::mod_security(),
        RequestedOptions::parse_flags(&["--with-brewed-apr", "--with-homebrew-httpd24"]),
        EL_CAPITAN,
        &lookup,
    );
    resolved.unwrap();
    assert_eq!(
        notices,
        vec![
            Notice::Deprecated {
                alias: "brewed-apr".to_string(),
                canonical: "homebrew-apr".to_string(),
            },
            Notice::Advisory(
                "Ignoring --with-homebrew-apr: homebrew apr included in httpd22 and httpd24"
                    .to_string()
            ),
        ]
    );
}

#[test]
fn alias_resolution_is_idempotent() {
    let lookup = everything_installed();
    let (first, notices) = run(
        &recipes::httpd24(),
        RequestedOptions::new().with("http2").with("ldap"),
        EL_CAPITAN,
        &lookup,
    );
    let first = first.unwrap();
    let deprecated = |notices: &[Notice]| {
        notices
            .iter()
            .filter(|n| matches!(n, Notice::Deprecated { .. }))
            .count()
    };
    assert_eq!(deprecated(&notices), 1);

    let mut again = RequestedOptions::new();
    for option in &first.options {
        again = again.with(option.clone());
    }
    let (second, notices) = run(&recipes::httpd24(), again, EL_CAPITAN, &lookup);
    assert_eq!(second.unwrap().options, first.options);
    assert_eq!(deprecated(&notices), 0);
}

#[test]
fn httpd22_rejects_ldap() {
    let lookup = everything_installed();
    let (result, notices) = run(
        &recipes::httpd22(),
        RequestedOptions::new().with("ldap"),
        EL_CAPITAN,
        &lookup,
    );
    assert!(matches!(result, Err(ResolveError::UnknownOption(name)) if name == "ldap"));
    assert!(notices.is_empty());
}

#[test]
fn httpd24_ldap_points_at_apr_util_openldap() {
    let lookup = everything_installed();
    let (resolved, notices) = run(
        &recipes::httpd24(),
        RequestedOptions::new().with("ldap"),
        EL_CAPITAN,
        &lookup,
    );
    let args = resolved.unwrap().configure_args;
    let pos = args.iter().position(|a| a == "--with-ldap").unwrap();
    assert_eq!(&args[pos..pos + 3], ["--with-ldap", "--enable-ldap", "--enable-authnz-ldap"]);
    assert!(notices
        .iter()
        .any(|n| matches!(n, Notice::Advisory(msg) if msg.contains("--with-openldap"))));
}

#[test]
fn layout_roles_distinct_under_any_root() {
    for recipe in recipes::all() {
        for root in ["/usr/local", "/opt/homebrew", "/Users/me/brew", "/"] {
            let layout = httpd_recipes::layout::generate(
                &recipe.layout,
                Path::new(root),
                &recipe.package_id(),
            )
            .unwrap();
            let mut seen = std::collections::BTreeSet::new();
            for (role, path) in &layout.roles {
                assert!(path.starts_with(root), "{}: {role}", recipe.name);
                assert!(seen.insert(path.clone()), "{}: {role} repeats", recipe.name);
            }
        }
    }
}

#[test]
fn shipped_patches_apply_twice_like_once() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::create_dir_all(dir.join("support")).unwrap();
    let makefile = "install:\n\tsed 's#@@ServerRoot@@#$(prefix)#g'\n";
    let support = "\tcp -p envvars-std $(DESTDIR)$(sbindir);\n\t$(DESTDIR)$(sbindir)/envvars\n";
    let sample = "SecAuditLog /var/log/modsec_audit.log\nSecDataDir /opt/modsecurity/var/data/\n";

    let lookup = everything_installed();
    for recipe in recipes::all() {
        fs::write(dir.join("Makefile.in"), makefile).unwrap();
        fs::write(dir.join("support/Makefile.in"), support).unwrap();
        fs::write(dir.join("support/apachectl.in"), ". @exp_sbindir@/envvars\n").unwrap();
        fs::write(dir.join("modsecurity.conf-recommended"), sample).unwrap();

        let (resolved, _) = run(&recipe, RequestedOptions::new(), OsVersion::SIERRA, &lookup);
        let patches: &PatchSet = &resolved.unwrap().patches;

        patches.apply(dir).unwrap();
        let once: Vec<Vec<u8>> = SOURCE_FILES
            .iter()
            .map(|f| fs::read(dir.join(f)).unwrap())
            .collect();
        let report = patches.apply(dir).unwrap();
        assert!(report.changed.is_empty(), "{}", recipe.name);
        let twice: Vec<Vec<u8>> = SOURCE_FILES
            .iter()
            .map(|f| fs::read(dir.join(f)).unwrap())
            .collect();
        assert_eq!(once, twice, "{}", recipe.name);
    }

    let text = fs::read_to_string(dir.join("modsecurity.conf-recommended")).unwrap();
    assert!(text.contains("SecAuditLog /usr/local/var/log/modsec_audit.log"));
    assert!(text.contains("SecDataDir /usr/local/opt/mod_security/var/data/"));
}

#[test]
fn mod_security_install_order() {
    let root = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(
        src.path().join("modsecurity.conf-recommended"),
        "SecAuditLog /var/log/modsec_audit.log\nSecDataDir /opt/modsecurity/var/data/\n",
    )
    .unwrap();

    let lookup = StaticLookup::installed_under(root.path(), &["apr", "apr-util", "pcre", "httpd24"])
        .with_file(root.path().join("opt/apr-util/bin"))
        .with_file(root.path().join("opt/httpd24/bin/apxs"));
    let host = Host {
        platform: PlatformContext::new(OsVersion::SIERRA, true),
        lookup: &lookup,
        root: root.path().to_path_buf(),
        jobs: 2,
    };
    let resolved = resolve(
        &recipes::mod_security(),
        &RequestedOptions::new(),
        &host,
        &mut Vec::<Notice>::new(),
    )
    .unwrap();

    let mut step = RecordingBuildStep::default();
    let mut notices: Vec<Notice> = Vec::new();
    let report = lifecycle::install(&resolved, src.path(), &mut step, &mut notices).unwrap();

    // the sample config is patched after the build and before it is installed
    assert_eq!(report.patched, vec![src.path().join("modsecurity.conf-recommended")]);
    assert_eq!(step.runs.len(), 2);
    let build: Vec<String> = step.runs[0].iter().map(|i| i.display()).collect();
    assert_eq!(build[0], "./autogen.sh");
    assert!(build[1].starts_with("./configure --prefix="));
    assert_eq!(build[2], "make -j2");
    assert!(step.runs[1][1]
        .display()
        .ends_with("Cellar/mod_security/2.9.2/modsecurity.conf-recommended"));

    assert!(report.plist.is_none());
    assert!(matches!(
        notices.as_slice(),
        [Notice::Caveat(text)] if text.contains("LoadModule security2_module")
    ));

    let none_before = resolved.patches.phase(PatchPhase::BeforeConfigure);
    assert!(none_before.is_empty());
}
