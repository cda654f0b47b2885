//! Configure-argument compiler.
//!
//! A template is an ordered list of inserts. Compiling walks the list once
//! and appends whatever each insert contributes; the output is never sorted
//! or deduplicated.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::deps::Selection;
use crate::options::OptionSet;
use crate::platform::PlatformContext;
use crate::predicate::Predicate;
use crate::util::{expand_vars, Vars};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Insert {
    /// Always emitted
    Base(Vec<String>),
    /// Emitted as a block when the option is active
    Feature { option: String, args: Vec<String> },
    /// Emitted when the slot resolved to a present provider; `{{path}}` is
    /// the provider's prefix path
    Dependency { slot: String, args: Vec<String> },
    /// Exactly one alternative: the first active option, else `default`
    Choice {
        choices: Vec<(String, Vec<String>)>,
        default: Vec<String>,
    },
    /// Emitted when the predicate holds
    Platform { when: Predicate, args: Vec<String> },
}

impl Insert {
    pub fn base(args: &[&str]) -> Self {
        Insert::Base(strings(args))
    }

    pub fn feature(option: impl Into<String>, args: &[&str]) -> Self {
        Insert::Feature {
            option: option.into(),
            args: strings(args),
        }
    }

    pub fn dependency(slot: impl Into<String>, args: &[&str]) -> Self {
        Insert::Dependency {
            slot: slot.into(),
            args: strings(args),
        }
    }

    pub fn choice(choices: &[(&str, &[&str])], default: &[&str]) -> Self {
        Insert::Choice {
            choices: choices
                .iter()
                .map(|(opt, args)| (opt.to_string(), strings(args)))
                .collect(),
            default: strings(default),
        }
    }

    /// Every alternative this insert could emit.
    fn alternatives(&self) -> Vec<&[String]> {
        match self {
            Insert::Base(args)
            | Insert::Feature { args, .. }
            | Insert::Dependency { args, .. }
            | Insert::Platform { args, .. } => vec![args.as_slice()],
            Insert::Choice { choices, default } => choices
                .iter()
                .map(|(_, args)| args.as_slice())
                .chain(std::iter::once(default.as_slice()))
                .collect(),
        }
    }
}

fn expand(list: &[String], vars: &Vars, out: &mut Vec<String>) {
    out.extend(list.iter().map(|a| expand_vars(vars, a)));
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// The flag key of an argument: everything before `=`.
pub fn flag_key(arg: &str) -> &str {
    arg.split_once('=').map(|(k, _)| k).unwrap_or(arg)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureTemplate {
    pub inserts: Vec<Insert>,
}

impl ConfigureTemplate {
    pub fn new(inserts: Vec<Insert>) -> Self {
        Self { inserts }
    }

    /// Compile the ordered argument list.
    ///
    /// `vars` supplies layout roles for `{{role}}` references.
    pub fn compile(
        &self,
        options: &OptionSet,
        selection: &Selection,
        platform: &PlatformContext,
        vars: &Vars,
    ) -> Vec<String> {
        let mut args = Vec::new();

        for insert in &self.inserts {
            match insert {
                Insert::Base(list) => expand(list, vars, &mut args),
                Insert::Feature { option, args: list } => {
                    if options.contains(option) {
                        expand(list, vars, &mut args);
                    }
                }
                Insert::Dependency { slot, args: list } => {
                    if let Some(dep) = selection.get(slot) {
                        let mut scoped = vars.clone();
                        scoped.insert("path".to_string(), dep.prefix_path.display().to_string());
                        expand(list, &scoped, &mut args);
                    }
                }
                Insert::Choice { choices, default } => {
                    let chosen = choices
                        .iter()
                        .find(|(opt, _)| options.contains(opt))
                        .map(|(_, list)| list)
                        .unwrap_or(default);
                    expand(chosen, vars, &mut args);
                }
                Insert::Platform { when, args: list } => {
                    if when.evaluate(options, platform) {
                        expand(list, vars, &mut args);
                    }
                }
            }
        }

        tracing::debug!(count = args.len(), "compiled configure arguments");
        args
    }

    /// Flag keys that some option combination would emit more than once.
    ///
    /// Alternatives of one `Choice` are exclusive, so a key shared between
    /// them is fine; a key repeated inside one alternative or across two
    /// inserts is a template defect.
    pub fn duplicate_keys(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dups = Vec::new();

        for insert in &self.inserts {
            let mut keys_of_insert: BTreeMap<&str, usize> = BTreeMap::new();
            for alt in insert.alternatives() {
                let mut per_alt: BTreeMap<&str, usize> = BTreeMap::new();
                for arg in alt {
                    *per_alt.entry(flag_key(arg)).or_default() += 1;
                }
                for (key, n) in per_alt {
                    let slot = keys_of_insert.entry(key).or_default();
                    *slot = (*slot).max(n);
                }
            }
            for (key, n) in keys_of_insert {
                *counts.entry(key).or_default() += n;
            }
        }

        for (key, n) in counts {
            if n > 1 {
                dups.push(key.to_string());
            }
        }
        dups
    }
}
