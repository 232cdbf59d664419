//! TOML recipe interpreter
//!
//! A recipe is a list of `[[resource]]` tables. Each declaration is
//! validated against the resource types registered for the node's
//! platform, then inserted into the run's resource collection.

use crate::platform::PlatformMap;
use anyhow::{Context, Result, bail};
use convergence::{
    Action, Guard, Notification, Resource, ResourceCollection, ResourceId, ShellCommand, Timing,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// A parsed recipe file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDoc {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,
}

/// One `[[resource]]` table
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub ignore_failure: bool,
    /// Pin a provider by name, bypassing the platform map
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub not_if: Vec<GuardDecl>,
    #[serde(default)]
    pub only_if: Vec<GuardDecl>,
    #[serde(default)]
    pub notifies: Vec<NotifyDecl>,
}

/// A shell-command guard on a declaration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardDecl {
    pub command: String,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Extra environment handed to the guard command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Seconds before the guard command is killed
    #[serde(default)]
    pub timeout: Option<u64>,
    /// A strict guard aborts the run if its command cannot execute
    #[serde(default)]
    pub strict: bool,
}

impl GuardDecl {
    fn shell_command(&self) -> ShellCommand {
        let mut command = ShellCommand::new(&self.command);
        if let Some(cwd) = &self.cwd {
            command = command.cwd(cwd);
        }
        for (key, value) in &self.env {
            command = command.env(key, value);
        }
        if let Some(secs) = self.timeout {
            command = command.timeout(Duration::from_secs(secs));
        }
        command
    }
}

/// A notification on a declaration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyDecl {
    /// Target reference in `type[name]` form
    pub resource: String,
    pub action: String,
    #[serde(default = "NotifyDecl::default_timing")]
    pub timing: String,
}

impl NotifyDecl {
    fn default_timing() -> String {
        "delayed".to_string()
    }

    fn parse_timing(&self) -> Result<Timing> {
        match self.timing.as_str() {
            "immediate" | "immediately" => Ok(Timing::Immediate),
            "delayed" => Ok(Timing::Delayed),
            other => bail!("unknown notification timing '{other}'"),
        }
    }
}

/// Parse and evaluate a single recipe file into `collection`
pub fn evaluate_file(
    path: &Path,
    cookbook: &str,
    recipe: &str,
    platform: &str,
    version: &str,
    map: &PlatformMap,
    collection: &mut ResourceCollection,
) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read recipe {}", path.display()))?;
    let doc: RecipeDoc = toml::from_str(&text)
        .with_context(|| format!("recipe {} is not valid", path.display()))?;
    evaluate(&doc, cookbook, recipe, platform, version, map, collection)
        .with_context(|| format!("in recipe {}", path.display()))
}

/// Evaluate a parsed recipe: validate each declaration and declare it
pub fn evaluate(
    doc: &RecipeDoc,
    cookbook: &str,
    recipe: &str,
    platform: &str,
    version: &str,
    map: &PlatformMap,
    collection: &mut ResourceCollection,
) -> Result<()> {
    for (index, decl) in doc.resources.iter().enumerate() {
        let resource = build_resource(decl, cookbook, recipe, index, platform, version, map)
            .with_context(|| {
                format!("declaration {}[{}] (#{})", decl.type_name, decl.name, index + 1)
            })?;
        log::debug!("declared {resource} from {cookbook}::{recipe}");
        collection.declare(resource);
    }
    Ok(())
}

fn build_resource(
    decl: &ResourceDecl,
    cookbook: &str,
    recipe: &str,
    index: usize,
    platform: &str,
    version: &str,
    map: &PlatformMap,
) -> Result<Resource> {
    let def = map.find_resource(platform, version, &decl.type_name)?;
    if !def.attributes.is_empty() {
        for key in decl.attributes.keys() {
            if !def.attributes.iter().any(|a| a == key) {
                log::warn!(
                    "{}[{}]: attribute '{key}' is not documented for this resource type",
                    decl.type_name,
                    decl.name
                );
            }
        }
    }
    if !def.allows(&decl.action) {
        bail!(
            "resource type '{}' does not support action '{}' (allowed: {})",
            decl.type_name,
            decl.action,
            def.allowed_actions.join(", ")
        );
    }

    let mut builder = Resource::declare(&decl.type_name, &decl.name)
        .action(decl.action.as_str())
        .attributes(decl.attributes.clone())
        .ignore_failure(decl.ignore_failure)
        .cookbook(cookbook)
        .source_line(format!("{cookbook}::{recipe}#{}", index + 1));
    if let Some(provider) = &decl.provider {
        builder = builder.provider(provider);
    }

    // not_if guards are evaluated before only_if guards at run time;
    // declaration order between the two lists does not matter
    for guard in &decl.not_if {
        let mut g = Guard::not_if_command(guard.shell_command());
        if guard.strict {
            g = g.strict();
        }
        builder = builder.guard(g);
    }
    for guard in &decl.only_if {
        let mut g = Guard::only_if_command(guard.shell_command());
        if guard.strict {
            g = g.strict();
        }
        builder = builder.guard(g);
    }

    for notify in &decl.notifies {
        let target: ResourceId = notify
            .resource
            .parse()
            .with_context(|| format!("bad notification target '{}'", notify.resource))?;
        builder = builder.notifies(Notification::new(
            target,
            Action::new(&notify.action),
            notify.parse_timing()?,
        ));
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers;
    use convergence::GuardTest;
    use serde_json::json;

    fn eval(text: &str) -> Result<ResourceCollection> {
        let doc: RecipeDoc = toml::from_str(text)?;
        let map = providers::builtin_map();
        let mut collection = ResourceCollection::new();
        evaluate(&doc, "base", "default", "ubuntu", "9.10", &map, &mut collection)?;
        Ok(collection)
    }

    #[test]
    fn declares_resources_in_file_order() {
        let collection = eval(
            r#"
            [[resource]]
            type = "directory"
            name = "/tmp/app"
            action = "create"

            [[resource]]
            type = "file"
            name = "/tmp/app/motd"
            action = "create"
            attributes = { content = "hello" }
            "#,
        )
        .unwrap();

        let ids: Vec<String> = collection.iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["directory[/tmp/app]", "file[/tmp/app/motd]"]);
        let file = collection.lookup("file[/tmp/app/motd]").unwrap();
        assert_eq!(file.attribute("content"), Some(&json!("hello")));
        assert_eq!(file.cookbook(), Some("base"));
        assert_eq!(file.source_line(), Some("base::default#2"));
    }

    #[test]
    fn guards_and_notifications_are_attached() {
        let collection = eval(
            r#"
            [[resource]]
            type = "execute"
            name = "make install"
            action = "run"
            attributes = { command = "make install" }
            not_if = [{ command = "test -f /usr/local/bin/tool" }]
            notifies = [{ resource = "file[/tmp/stamp]", action = "touch", timing = "immediate" }]

            [[resource]]
            type = "file"
            name = "/tmp/stamp"
            action = "nothing"
            "#,
        )
        .unwrap();

        let execute = collection.lookup("execute[make install]").unwrap();
        assert_eq!(execute.guards().len(), 1);
        let notify = &execute.notifications()[0];
        assert_eq!(notify.target.to_string(), "file[/tmp/stamp]");
        assert_eq!(notify.timing, Timing::Immediate);

        let stamp = collection.lookup("file[/tmp/stamp]").unwrap();
        assert!(stamp.action().is_nothing());
    }

    #[test]
    fn guard_env_reaches_the_command() {
        let collection = eval(
            r#"
            [[resource]]
            type = "execute"
            name = "migrate"
            action = "run"
            attributes = { command = "bin/migrate" }
            only_if = [{ command = "test \"$APP_READY\" = yes", env = { APP_READY = "yes" } }]
            "#,
        )
        .unwrap();

        let execute = collection.lookup("execute[migrate]").unwrap();
        let GuardTest::Command(cmd) = &execute.guards()[0].test else {
            panic!("expected a command guard");
        };
        assert_eq!(cmd.env, [("APP_READY".to_string(), "yes".to_string())]);
    }

    #[test]
    fn unknown_resource_type_is_rejected() {
        let err = eval(
            r#"
            [[resource]]
            type = "teleporter"
            name = "beam"
            action = "engage"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("teleporter"));
    }

    #[test]
    fn disallowed_action_is_rejected() {
        let err = eval(
            r#"
            [[resource]]
            type = "file"
            name = "/tmp/x"
            action = "explode"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("does not support action 'explode'"));
    }

    #[test]
    fn bad_timing_is_rejected() {
        let err = eval(
            r#"
            [[resource]]
            type = "file"
            name = "/tmp/x"
            action = "create"
            notifies = [{ resource = "file[/tmp/y]", action = "touch", timing = "someday" }]
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("someday"));
    }
}
