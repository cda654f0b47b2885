//! Apache httpd 2.2 and 2.4.
//!
//! Both majors share options, layout, service and most of the configure
//! template. They differ in a handful of flags, the pcre dependency (optional
//! on 2.2), HTTP/2 support (2.4 only) and how envvars are moved out of sbin.

use crate::build::BuildCommand;
use crate::conflicts::ConflictRule;
use crate::configure::{ConfigureTemplate, Insert};
use crate::deps::{Advisory, Candidate, DependencySlot, Necessity};
use crate::layout::{Anchor, LayoutEntry, LayoutSpec};
use crate::options::BuildOption;
use crate::patch::{PatchPhase, PatchRule};
use crate::predicate::Predicate;
use crate::recipe::{Caveat, Recipe};
use crate::service::ServiceSpec;

use super::host_variants;

const MODULE_FLAGS: &[&str] = &[
    "--enable-layout=Homebrew",
    "--enable-mods-shared=all",
    "--enable-unique-id",
    "--enable-ssl",
    "--enable-dav",
    "--enable-cache",
];

const MODULE_FLAGS_TAIL: &[&str] = &[
    "--enable-logio",
    "--enable-deflate",
    "--enable-cgi",
    "--enable-cgid",
    "--enable-suexec",
    "--enable-rewrite",
];

const LAUNCH_DAEMON_CAVEAT: &str = "\
To load {{name}} when --with-privileged-ports is used:
    sudo cp -v {{plist_path}} /Library/LaunchDaemons
    sudo chown -v root:wheel /Library/LaunchDaemons/{{plist_name}}
    sudo chmod -v 644 /Library/LaunchDaemons/{{plist_name}}
    sudo launchctl load /Library/LaunchDaemons/{{plist_name}}

To reload {{name}} after an upgrade when --with-privileged-ports is used:
    sudo launchctl unload /Library/LaunchDaemons/{{plist_name}}
    sudo launchctl load /Library/LaunchDaemons/{{plist_name}}

If not using --with-privileged-ports, use the instructions below.";

pub fn httpd22() -> Recipe {
    let mut recipe = base("httpd22", "2.2.34", "2.2");
    recipe
        .options
        .push(BuildOption::new("pcre", "Build with the pcre library"));

    recipe.slots = vec![
        DependencySlot::required("apr", "apr"),
        DependencySlot::required("apr-util", "apr-util"),
        DependencySlot::required("openssl", "openssl"),
        DependencySlot::required("zlib", "zlib"),
        DependencySlot::new("pcre", Necessity::WhenSelected)
            .candidate(Candidate::package(Predicate::option("pcre"), "pcre")),
    ];

    let mut flags = MODULE_FLAGS.to_vec();
    flags.push("--enable-proxy");
    flags.extend_from_slice(MODULE_FLAGS_TAIL);

    let mut inserts = vec![Insert::base(&flags)];
    inserts.extend(shared_dependency_inserts(false));
    inserts.extend(shared_choice_inserts());
    inserts.push(Insert::dependency("pcre", &["--with-pcre={{path}}"]));
    recipe.configure = ConfigureTemplate::new(inserts);

    recipe.patches = vec![
        server_root_patch(),
        PatchRule::new(
            "support/Makefile.in",
            "cp -p envvars-std $(DESTDIR)$(sbindir);",
            "mkdir -p $(DESTDIR)$(sysconfdir); cp -p envvars-std $(DESTDIR)$(sysconfdir);",
            PatchPhase::BeforeConfigure,
        )
        .mandatory(),
        envvars_patch(),
    ];

    recipe
}

pub fn httpd24() -> Recipe {
    let mut recipe = base("httpd24", "2.4.27", "2.4");
    recipe.options.push(
        BuildOption::new("nghttp2", "Build with HTTP/2 support via nghttp2").enabled_by_default(),
    );
    recipe.options.push(BuildOption::alias("http2", "nghttp2"));
    recipe
        .options
        .push(BuildOption::new("ldap", "Include support for LDAP"));
    recipe.advisories = vec![Advisory {
        when: Predicate::option("ldap"),
        message: "--with-ldap needs apr-util built with OpenLDAP (apr-util --with-openldap)"
            .to_string(),
    }];

    recipe.slots = vec![
        DependencySlot::required("apr", "apr"),
        DependencySlot::required("apr-util", "apr-util"),
        DependencySlot::required("pcre", "pcre"),
        DependencySlot::required("openssl", "openssl"),
        DependencySlot::required("zlib", "zlib"),
        DependencySlot::new("nghttp2", Necessity::Optional)
            .candidate(Candidate::package(Predicate::option("nghttp2"), "nghttp2")),
    ];

    let mut flags = MODULE_FLAGS.to_vec();
    flags.extend_from_slice(MODULE_FLAGS_TAIL);

    let mut inserts = vec![Insert::base(&flags)];
    inserts.extend(shared_dependency_inserts(true));
    inserts.extend(shared_choice_inserts());
    inserts.push(Insert::dependency(
        "nghttp2",
        &["--enable-http2", "--with-nghttp2={{path}}"],
    ));
    inserts.push(ldap_insert());
    recipe.configure = ConfigureTemplate::new(inserts);

    recipe.layout.config_dirs = vec!["sysconfdir".to_string()];

    recipe.patches = vec![
        server_root_patch(),
        envvars_patch(),
        PatchRule::new(
            "support/Makefile.in",
            "envvars-std $(DESTDIR)$(sbindir);",
            "envvars-std $(DESTDIR)$(sysconfdir);",
            PatchPhase::BeforeConfigure,
        )
        .mandatory(),
        PatchRule::new(
            "support/apachectl.in",
            "@exp_sbindir@/envvars",
            "{{sysconfdir}}/envvars",
            PatchPhase::BeforeConfigure,
        )
        .mandatory(),
    ];

    recipe
}

/// Everything the two majors have in common.
fn base(name: &str, version: &str, qualifier: &str) -> Recipe {
    let mut recipe = Recipe::new(name, version, qualifier);
    recipe.description = "HTTP server".to_string();
    recipe.homepage = "https://httpd.apache.org/".to_string();

    recipe.options = vec![
        BuildOption::new(
            "mpm-worker",
            "Use the Worker Multi-Processing Module instead of Prefork",
        ),
        BuildOption::new(
            "mpm-event",
            "Use the Event Multi-Processing Module instead of Prefork",
        ),
        BuildOption::new(
            "privileged-ports",
            "Use the default ports 80 and 443 (which require root privileges), instead of 8080 and 8443",
        ),
    ];

    recipe.conflicts = vec![ConflictRule::new(
        ["mpm-worker", "mpm-event"],
        "cannot build with both worker and event MPMs, choose one",
    )];
    recipe.conflicts_with = host_variants().conflicts_of(name);

    recipe.layout = layout();
    recipe.build = vec![BuildCommand::Configure, BuildCommand::make()];
    recipe.install = vec![BuildCommand::make_target("install")];

    recipe.service = Some(ServiceSpec {
        executable: "{{opt_prefix}}/bin/httpd".to_string(),
        args: vec!["-D".to_string(), "FOREGROUND".to_string()],
        run_at_load: true,
        startup_option: Some("privileged-ports".to_string()),
        manual_command: "apachectl start".to_string(),
    });
    recipe.caveats = vec![Caveat::when(
        Predicate::option("privileged-ports"),
        LAUNCH_DAEMON_CAVEAT,
    )];

    recipe
}

fn layout() -> LayoutSpec {
    LayoutSpec {
        name: "Homebrew".to_string(),
        entries: vec![
            LayoutEntry::anchored("prefix", Anchor::Keg, ""),
            LayoutEntry::alias("exec_prefix", "prefix"),
            LayoutEntry::under("bindir", "exec_prefix", "bin"),
            LayoutEntry::alias("sbindir", "bindir"),
            LayoutEntry::under("libdir", "exec_prefix", "lib"),
            LayoutEntry::under("libexecdir", "exec_prefix", "libexec"),
            LayoutEntry::anchored("mandir", Anchor::Keg, "share/man"),
            LayoutEntry::anchored("sysconfdir", Anchor::Etc, "apache2/{{qualifier}}"),
            LayoutEntry::anchored("datadir", Anchor::Var, "www"),
            LayoutEntry::under("installbuilddir", "prefix", "build"),
            LayoutEntry::under("errordir", "datadir", "error"),
            LayoutEntry::under("iconsdir", "datadir", "icons"),
            LayoutEntry::under("htdocsdir", "datadir", "htdocs"),
            LayoutEntry::under("manualdir", "datadir", "manual"),
            LayoutEntry::anchored("cgidir", Anchor::Var, "apache2/cgi-bin"),
            LayoutEntry::under("includedir", "prefix", "include/httpd"),
            LayoutEntry::anchored("localstatedir", Anchor::Var, "apache2"),
            LayoutEntry::anchored("runtimedir", Anchor::Var, "run/apache2"),
            LayoutEntry::anchored("logfiledir", Anchor::Var, "log/apache2"),
            LayoutEntry::under("proxycachedir", "localstatedir", "proxy"),
            LayoutEntry::anchored("opt_prefix", Anchor::Opt, "").internal(),
            LayoutEntry::anchored("etc", Anchor::Etc, "").internal(),
            LayoutEntry::anchored("var", Anchor::Var, "").internal(),
        ],
        file_name: Some("config.layout".to_string()),
        config_dirs: Vec::new(),
        state_dirs: vec!["logfiledir".to_string(), "runtimedir".to_string()],
        log_files: vec![
            ("logfiledir".to_string(), "access_log".to_string()),
            ("logfiledir".to_string(), "error_log".to_string()),
        ],
    }
}

fn shared_dependency_inserts(with_pcre: bool) -> Vec<Insert> {
    let mut inserts = vec![
        Insert::dependency("apr", &["--with-apr={{path}}"]),
        Insert::dependency("apr-util", &["--with-apr-util={{path}}"]),
    ];
    if with_pcre {
        inserts.push(Insert::dependency("pcre", &["--with-pcre={{path}}"]));
    }
    inserts.push(Insert::dependency("openssl", &["--with-ssl={{path}}"]));
    inserts.push(Insert::dependency("zlib", &["--with-z={{path}}"]));
    inserts
}

fn shared_choice_inserts() -> Vec<Insert> {
    vec![
        Insert::choice(
            &[
                ("mpm-worker", &["--with-mpm=worker"]),
                ("mpm-event", &["--with-mpm=event"]),
            ],
            &["--with-mpm=prefork"],
        ),
        Insert::choice(
            &[("privileged-ports", &["--with-port=80", "--with-sslport=443"])],
            &["--with-port=8080", "--with-sslport=8443"],
        ),
    ]
}

fn ldap_insert() -> Insert {
    Insert::feature("ldap", &["--with-ldap", "--enable-ldap", "--enable-authnz-ldap"])
}

/// Config files reference the opt prefix, not the versioned keg.
fn server_root_patch() -> PatchRule {
    PatchRule::new(
        "Makefile.in",
        "#@@ServerRoot@@#$(prefix)#",
        "#@@ServerRoot@@#{{opt_prefix}}#",
        PatchPhase::BeforeConfigure,
    )
    .mandatory()
}

fn envvars_patch() -> PatchRule {
    PatchRule::new(
        "support/Makefile.in",
        "$(DESTDIR)$(sbindir)/envvars",
        "$(DESTDIR)$(sysconfdir)/envvars",
        PatchPhase::BeforeConfigure,
    )
    .mandatory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_specific_flags() {
        let flags22 = match &httpd22().configure.inserts[0] {
            Insert::Base(args) => args.clone(),
            other => panic!("unexpected insert: {other:?}"),
        };
        assert!(flags22.contains(&"--enable-proxy".to_string()));

        let flags24 = match &httpd24().configure.inserts[0] {
            Insert::Base(args) => args.clone(),
            other => panic!("unexpected insert: {other:?}"),
        };
        assert!(!flags24.contains(&"--enable-proxy".to_string()));
        assert_eq!(flags24.len(), 12);
    }

    #[test]
    fn test_http2_only_on_24() {
        assert!(httpd24().registry().unwrap().has("nghttp2"));
        assert!(httpd24().registry().unwrap().has("http2"));
        assert!(!httpd22().registry().unwrap().has("nghttp2"));
        assert!(httpd22().registry().unwrap().has("pcre"));
    }

    #[test]
    fn test_ldap_only_on_24() {
        assert!(httpd24().registry().unwrap().has("ldap"));
        assert!(!httpd22().registry().unwrap().has("ldap"));
        assert!(httpd22().advisories.is_empty());

        let mentions_ldap = |insert: &Insert| format!("{insert:?}").contains("--with-ldap");
        assert!(!httpd22().configure.inserts.iter().any(mentions_ldap));
        assert!(httpd24().configure.inserts.iter().any(mentions_ldap));
    }

    #[test]
    fn test_patch_sets_are_idempotent() {
        use crate::patch::PatchSet;
        for recipe in [httpd22(), httpd24()] {
            assert!(PatchSet::new(recipe.patches.clone()).is_ok(), "{}", recipe.name);
        }
    }
}
