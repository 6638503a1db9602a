mod catalog;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

pub use catalog::{Catalog, CommandMeta, InstalledModule, RESERVED_PATHS};

use crate::error::{Error, ErrorType};

pub const DESCRIPTOR_FILE: &str = "module.json";

/// Discovers installed modules, verifies them and owns the active command
/// catalog. A new catalog is built and verified as a whole, then the single
/// pointer is rotated; concurrent readers observe either the old or the new
/// catalog in full.
pub struct ModuleRegistry {
    modules_path: PathBuf,
    active: RwLock<Arc<Catalog>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new(modules_path: impl Into<PathBuf>) -> Self {
        Self {
            modules_path: modules_path.into(),
            active: RwLock::new(Arc::new(Catalog::default())),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.active.read())
    }

    /// Scan the modules directory and swap in a freshly built catalog.
    /// Runs on startup and after install/uninstall.
    #[tracing::instrument(skip(self), fields(modules_path = %self.modules_path.display()))]
    pub fn load(&self) -> Result<(), Error> {
        let modules = self.scan()?;
        let catalog = Catalog::build(modules)?;
        *self.active.write() = Arc::new(catalog);
        tracing::info!("command catalog reloaded");
        Ok(())
    }

    fn scan(&self) -> Result<Vec<InstalledModule>, Error> {
        let mut modules = vec![];
        if !self.modules_path.exists() {
            return Ok(modules);
        }
        let entries = std::fs::read_dir(&self.modules_path)
            .map_err(|err| ErrorType::InternalError(err.into()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ErrorType::InternalError(err.into()))?;
            if entry.path().is_dir() {
                modules.push(read_module(&entry.path())?);
            }
        }
        Ok(modules)
    }

    /// Install the module located at `source`. The candidate catalog is
    /// built and verified before anything is copied; the active catalog is
    /// only swapped after the copy succeeded.
    #[tracing::instrument(skip(self), fields(source = %source.display()))]
    pub fn install(&self, source: &Path) -> Result<InstalledModule, Error> {
        let candidate = read_module(source)?;
        let module_name = candidate.descriptor.module_name.clone();

        let mut modules = self.scan()?;
        if modules
            .iter()
            .any(|m| m.descriptor.module_name == module_name)
        {
            return Err(ErrorType::AlreadyExists(format!(
                "Module `{module_name}` is already installed"
            ))
            .into());
        }
        modules.push(candidate.clone());
        Catalog::build(modules)?;

        let target = self.modules_path.join(&module_name);
        copy_dir(source, &target).map_err(|err| ErrorType::InternalError(err.into()))?;

        if let Err(err) = self.load() {
            // Roll the copy back so a broken module does not wedge the next
            // startup.
            let _ = std::fs::remove_dir_all(&target);
            return Err(err);
        }
        Ok(candidate)
    }

    /// Remove an installed module and rebuild the catalog.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&self, module_name: &str) -> Result<(), Error> {
        let modules = self.scan()?;
        if !modules
            .iter()
            .any(|m| m.descriptor.module_name == module_name)
        {
            return Err(ErrorType::NotInstalled {
                module: module_name.to_string(),
            }
            .into());
        }
        let dependents = modules
            .iter()
            .filter(|m| {
                m.descriptor
                    .dependencies
                    .iter()
                    .any(|d| d.module_name == module_name)
            })
            .map(|m| m.descriptor.module_name.clone())
            .collect::<Vec<_>>();
        if !dependents.is_empty() {
            return Err(ErrorType::InvalidState(format!(
                "Module `{module_name}` is required by: {}",
                dependents.join(", ")
            ))
            .into());
        }

        std::fs::remove_dir_all(self.modules_path.join(module_name))
            .map_err(|err| ErrorType::InternalError(err.into()))?;
        self.load()
    }
}

/// Parse a module directory: the descriptor plus the command tree its
/// `cli_path` names.
fn read_module(dir: &Path) -> Result<InstalledModule, Error> {
    let invalid =
        |message: String| Error::from(ErrorType::InvalidDescriptor(message));

    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    let raw = std::fs::read_to_string(&descriptor_path)
        .map_err(|_| invalid(format!("missing descriptor `{}`", descriptor_path.display())))?;
    let descriptor: modular_types::module::ModuleDescriptor =
        serde_json::from_str(&raw).map_err(|err| invalid(format!("bad descriptor: {err}")))?;

    let cli_path = Path::new(&descriptor.cli_path);
    if cli_path.is_absolute()
        || cli_path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(invalid(format!(
            "`cli_path` must stay inside the module directory, got `{}`",
            descriptor.cli_path
        )));
    }
    let tree_path = dir.join(cli_path);
    let raw = std::fs::read_to_string(&tree_path)
        .map_err(|_| invalid(format!("missing command tree `{}`", tree_path.display())))?;
    let tree: modular_types::module::ModuleTree =
        serde_json::from_str(&raw).map_err(|err| invalid(format!("bad command tree: {err}")))?;

    Ok(InstalledModule { descriptor, tree })
}

fn copy_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &destination)?;
        } else {
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}
