use super::{DiscoveryError, Icon};
use ini::Ini;
use log::{debug, warn};
use std::{
    collections::HashSet,
    fmt, fs,
    hash::{Hash, Hasher},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use zbus::{names::BusName, zvariant::ObjectPath};

/// Where a cloud provider daemon can be reached.
///
/// Two descriptors are equal when they point to the same bus name and object path,
/// the icon hint is not part of the identity.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    bus_name: String,
    object_path: String,
    icon: Option<Icon>,
}

impl ProviderDescriptor {
    pub const GROUP: &'static str = "Gtk Cloud Provider";
    pub const BUS_NAME_KEY: &'static str = "BusName";
    pub const OBJECT_PATH_KEY: &'static str = "ObjectPath";
    pub const ICON_KEY: &'static str = "Icon";

    pub fn new(
        bus_name: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Result<Self, DiscoveryError> {
        let bus_name = bus_name.into();
        let object_path = object_path.into();

        if let Err(e) = BusName::try_from(bus_name.as_str()) {
            return Err(DiscoveryError::InvalidName {
                what: "bus name",
                value: bus_name,
                reason: e.to_string(),
            });
        }
        if let Err(e) = ObjectPath::try_from(object_path.as_str()) {
            return Err(DiscoveryError::InvalidName {
                what: "object path",
                value: object_path,
                reason: e.to_string(),
            });
        }

        Ok(Self {
            bus_name,
            object_path,
            icon: None,
        })
    }

    #[must_use]
    pub fn with_icon(mut self, icon: Option<Icon>) -> Self {
        self.icon = icon;
        self
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub const fn icon(&self) -> Option<&Icon> {
        self.icon.as_ref()
    }

    /// Parse the content of a descriptor file.
    ///
    /// ```ini
    /// [Gtk Cloud Provider]
    /// BusName=org.example.Cloud
    /// ObjectPath=/org/example/Cloud
    /// Icon=folder-remote
    /// ```
    pub fn from_key_file(path: &Path, content: &str) -> Result<Self, DiscoveryError> {
        // skip a byte order mark
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let ini = Ini::load_from_str(content).map_err(|e| DiscoveryError::Malformed {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_ini(path, &ini)
    }

    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => DiscoveryError::Unreadable {
                path: path.to_owned(),
                source,
            },
            ini::Error::Parse(e) => DiscoveryError::Malformed {
                path: path.to_owned(),
                reason: e.to_string(),
            },
        })?;
        Self::from_ini(path, &ini)
    }

    fn from_ini(path: &Path, ini: &Ini) -> Result<Self, DiscoveryError> {
        let malformed = |reason: String| DiscoveryError::Malformed {
            path: path.to_owned(),
            reason,
        };

        let Some(group) = ini.section(Some(Self::GROUP)) else {
            return Err(malformed(format!("missing group [{}]", Self::GROUP)));
        };
        let required = |key: &str| {
            group
                .get(key)
                .ok_or_else(|| malformed(format!("missing key {key}")))
        };
        let bus_name = required(Self::BUS_NAME_KEY)?;
        let object_path = required(Self::OBJECT_PATH_KEY)?;
        let icon = group.get(Self::ICON_KEY).and_then(Icon::parse);

        Ok(Self::new(bus_name, object_path)?.with_icon(icon))
    }
}

impl PartialEq for ProviderDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.bus_name == other.bus_name && self.object_path == other.object_path
    }
}

impl Eq for ProviderDescriptor {}

impl Hash for ProviderDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bus_name.hash(state);
        self.object_path.hash(state);
    }
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.bus_name, self.object_path)
    }
}

/// Something that knows which providers are advertised.
///
/// Implementations may block, the registry calls them off the async runtime.
pub trait DescriptorSource: Send + Sync + 'static {
    /// Every valid descriptor currently advertised, in display order.
    ///
    /// Entries that can't be read are skipped, they never make the whole listing fail.
    fn descriptors(&self) -> Vec<ProviderDescriptor>;
}

/// Reads `*.ini` descriptor files from a list of directories.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    directories: Vec<PathBuf>,
}

impl DirectorySource {
    pub const EXTENSION: &'static str = "ini";

    pub const fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    fn files_in(directory: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No provider directory at {}", directory.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Cannot list {}: {e}", directory.display());
                return Vec::new();
            }
        };

        let mut files: Vec<_> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("Cannot list {}: {e}", directory.display());
                    None
                }
            })
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == Self::EXTENSION) && path.is_file()
            })
            .collect();
        files.sort();
        files
    }
}

impl DescriptorSource for DirectorySource {
    fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        for path in self.directories.iter().flat_map(|dir| Self::files_in(dir)) {
            match ProviderDescriptor::from_file(&path) {
                Ok(descriptor) => {
                    if seen.insert(descriptor.clone()) {
                        descriptors.push(descriptor);
                    } else {
                        debug!("{descriptor} is advertised twice, ignoring {}", path.display());
                    }
                }
                Err(e) => warn!("Skipping provider descriptor: {e}"),
            }
        }

        descriptors
    }
}
