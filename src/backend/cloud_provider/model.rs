use std::{path::PathBuf, sync::Arc};
use strum::{Display, FromRepr};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display)]
#[repr(i32)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    /// The provider never answered, or answered something we couldn't understand.
    #[default]
    Invalid = 0,
    /// Everything is synchronized.
    Idle = 1,
    /// A synchronization is in progress.
    Syncing = 2,
    /// The provider reported a synchronization failure.
    Error = 3,
}

/// An icon attached to a provider.
///
/// Cloning is cheap, the content is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Icon {
    /// Name to look up in the icon theme.
    Themed(Arc<str>),
    /// Absolute path to an image file.
    File(Arc<PathBuf>),
}

impl Icon {
    /// Interpret the value of an `Icon` key: absolute paths are files, anything else is a themed name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if value.starts_with('/') {
            Some(Self::File(Arc::new(PathBuf::from(value))))
        } else {
            Some(Self::Themed(value.into()))
        }
    }
}

/// A read-only menu tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuModel {
    items: Arc<[MenuItem]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: Option<String>,
    /// Detailed action name triggered when the item is activated
    pub action: Option<String>,
    pub submenu: Option<MenuModel>,
    /// Items rendered inline, visually grouped
    pub section: Option<MenuModel>,
}

impl Default for MenuModel {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MenuModel {
    pub fn new(items: impl Into<Arc<[MenuItem]>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items in the whole tree, sections and submenus included.
    pub fn len_recursive(&self) -> usize {
        self.items
            .iter()
            .map(|item| {
                1 + item.submenu.as_ref().map_or(0, Self::len_recursive)
                    + item.section.as_ref().map_or(0, Self::len_recursive)
            })
            .sum()
    }
}

impl MenuItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            action: None,
            submenu: None,
            section: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_submenu(mut self, submenu: MenuModel) -> Self {
        self.submenu = Some(submenu);
        self
    }

    /// An unlabelled item holding a section.
    pub fn section(section: MenuModel) -> Self {
        Self {
            label: None,
            action: None,
            submenu: None,
            section: Some(section),
        }
    }
}
