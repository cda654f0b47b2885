//! Service descriptor for the process supervisor (launchd property list).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::options::OptionSet;
use crate::util::{expand_vars, Vars};

/// Recipe-side description of how the service runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    /// Executable template, e.g. `{{opt_prefix}}/bin/httpd`
    pub executable: String,
    pub args: Vec<String>,
    pub run_at_load: bool,
    /// Option that makes the supervisor start the service at boot
    pub startup_option: Option<String>,
    /// Command for starting the service by hand
    pub manual_command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub label: String,
    pub executable: String,
    pub args: Vec<String>,
    pub auto_start: bool,
    pub run_at_load: bool,
}

/// Label used for the supervisor job of a package.
pub fn label_for(package: &str) -> String {
    format!("homebrew.mxcl.{}", package)
}

/// Build the descriptor for a package.
///
/// `auto_start` is only set when the startup option is active; binding to
/// privileged ports needs a root-owned daemon rather than a user agent.
pub fn generate(
    package: &str,
    spec: &ServiceSpec,
    options: &OptionSet,
    vars: &Vars,
) -> ServiceDescriptor {
    let auto_start = spec
        .startup_option
        .as_ref()
        .is_some_and(|opt| options.contains(opt));

    ServiceDescriptor {
        label: label_for(package),
        executable: expand_vars(vars, &spec.executable),
        args: spec.args.iter().map(|a| expand_vars(vars, a)).collect(),
        auto_start,
        run_at_load: spec.run_at_load,
    }
}

impl ServiceDescriptor {
    pub fn file_name(&self) -> String {
        format!("{}.plist", self.label)
    }

    /// Render as an XML property list.
    pub fn to_plist(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(
            "<!DOCTYPE plist PUBLIC \"-//Apple Computer//DTD PLIST 1.0//EN\" \
             \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        );
        out.push_str("<plist version=\"1.0\">\n<dict>\n");
        out.push_str("  <key>Label</key>\n");
        out.push_str(&format!("  <string>{}</string>\n", xml_escape(&self.label)));
        out.push_str("  <key>ProgramArguments</key>\n  <array>\n");
        for arg in std::iter::once(&self.executable).chain(&self.args) {
            out.push_str(&format!("    <string>{}</string>\n", xml_escape(arg)));
        }
        out.push_str("  </array>\n");
        out.push_str("  <key>RunAtLoad</key>\n");
        out.push_str(if self.run_at_load { "  <true/>\n" } else { "  <false/>\n" });
        out.push_str("</dict>\n</plist>\n");
        out
    }

    /// Write the property list into `dir`, replacing any previous copy.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_plist())?;
        Ok(path)
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
