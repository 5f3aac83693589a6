//! The Launcher (§4.I): a context that publishes a catalogue of runnable
//! applications and exposes `startApp`/`reloadAppList` over the command
//! port. The catalogue lives under a `parking_lot::RwLock`, matching the
//! Registry's own table-locking convention (`nimo-registry::registry`).

mod handlers;

pub use handlers::build_handlers;

use std::process::Stdio;

use parking_lot::RwLock;

use nimo_types::NimoError;

/// One entry in the catalogue (§4.I: "short-name, description, path,
/// argument descriptor list, option descriptor list"). Descriptor lists
/// are carried as plain strings — the original spec does not define a
/// richer schema for them, and none is needed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    pub short_name: String,
    pub description: String,
    pub executable_path: String,
    pub argument_descriptors: Vec<String>,
    pub option_descriptors: Vec<String>,
}

/// The catalogue plus the machinery to start a listed app. One per
/// Launcher process.
pub struct Launcher {
    apps: RwLock<Vec<AppDescriptor>>,
}

impl Launcher {
    pub fn new(apps: Vec<AppDescriptor>) -> Self {
        Self {
            apps: RwLock::new(apps),
        }
    }

    pub fn get_number_of_applications(&self) -> usize {
        self.apps.read().len()
    }

    pub fn get_names_of_applications(&self) -> Vec<String> {
        self.apps.read().iter().map(|a| a.short_name.clone()).collect()
    }

    pub fn get_application_info(&self, short_name: &str) -> Option<AppDescriptor> {
        self.apps
            .read()
            .iter()
            .find(|a| a.short_name == short_name)
            .cloned()
    }

    pub fn get_run_options_for_app(&self, short_name: &str) -> Result<Vec<String>, NimoError> {
        self.find(short_name).map(|a| a.option_descriptors)
    }

    pub fn get_run_params_for_app(&self, short_name: &str) -> Result<Vec<String>, NimoError> {
        self.find(short_name).map(|a| a.argument_descriptors)
    }

    fn find(&self, short_name: &str) -> Result<AppDescriptor, NimoError> {
        self.get_application_info(short_name)
            .ok_or_else(|| NimoError::not_found(format!("no application named {short_name}")))
    }

    /// Replace the whole catalogue (§4.I `reloadAppList`: "no diffing" —
    /// this is intentionally a flat replace, not a merge).
    pub fn reload_app_list(&self, apps: Vec<AppDescriptor>) {
        *self.apps.write() = apps;
    }

    /// Spawn the named app's executable with the given arguments and
    /// options, returning its PID without tracking it further (§4.I:
    /// "it does not track the child after launch"). Runs the blocking
    /// `std::process::Command::spawn` on a blocking-pool thread since the
    /// handler itself must not block the reactor.
    pub async fn start_app(
        &self,
        short_name: &str,
        args: Vec<String>,
        options: Vec<String>,
    ) -> Result<u32, NimoError> {
        let descriptor = self.find(short_name)?;
        tokio::task::spawn_blocking(move || {
            let mut command = std::process::Command::new(&descriptor.executable_path);
            command
                .args(options)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            command
                .spawn()
                .map(|child| child.id())
                .map_err(|e| NimoError::internal(format!("spawning {}: {e}", descriptor.executable_path)))
        })
        .await
        .map_err(|e| NimoError::internal(format!("start_app task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppDescriptor {
        AppDescriptor {
            short_name: "echo".into(),
            description: "prints its arguments".into(),
            executable_path: "/bin/echo".into(),
            argument_descriptors: vec!["message".into()],
            option_descriptors: vec![],
        }
    }

    #[test]
    fn catalogue_queries_reflect_loaded_apps() {
        let launcher = Launcher::new(vec![sample()]);
        assert_eq!(launcher.get_number_of_applications(), 1);
        assert_eq!(launcher.get_names_of_applications(), vec!["echo".to_string()]);
        assert!(launcher.get_application_info("echo").is_some());
        assert!(launcher.get_application_info("missing").is_none());
    }

    #[test]
    fn run_descriptors_for_unknown_app_are_not_found() {
        let launcher = Launcher::new(vec![]);
        let err = launcher.get_run_options_for_app("echo").unwrap_err();
        assert_eq!(err.kind, nimo_types::ErrorKind::NotFound);
    }

    #[test]
    fn reload_replaces_the_whole_catalogue() {
        let launcher = Launcher::new(vec![sample()]);
        launcher.reload_app_list(vec![]);
        assert_eq!(launcher.get_number_of_applications(), 0);
    }

    #[tokio::test]
    async fn start_app_spawns_and_returns_a_pid() {
        let launcher = Launcher::new(vec![sample()]);
        let pid = launcher.start_app("echo", vec!["hello".into()], vec![]).await.unwrap();
        assert!(pid > 0);
    }

    #[tokio::test]
    async fn start_app_rejects_unknown_name() {
        let launcher = Launcher::new(vec![]);
        let err = launcher.start_app("nope", vec![], vec![]).await.unwrap_err();
        assert_eq!(err.kind, nimo_types::ErrorKind::NotFound);
    }
}
