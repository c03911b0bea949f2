#![forbid(unsafe_code)]

//! Render-tree node identities.

use std::fmt;

/// Opaque identity of a render-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ViewTag(pub i32);

impl fmt::Display for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i32> for ViewTag {
    fn from(tag: i32) -> Self {
        Self(tag)
    }
}

/// Opaque handle to the native node backing a view (a shadow-node wrapper).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeRef(pub u64);

/// One render-tree node targeted by reactive updates. Immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub tag: ViewTag,
    pub name: String,
    pub node: Option<NativeRef>,
}

impl ViewDescriptor {
    #[must_use]
    pub fn new(tag: impl Into<ViewTag>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            node: None,
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: NativeRef) -> Self {
        self.node = Some(node);
        self
    }
}

/// Schema the render tree uses to accept properties for a view class.
///
/// Adapting it is the one-time upgrade that lets the tree accept payloads
/// pushed outside the declarative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewConfig {
    pub class_name: String,
}

impl ViewConfig {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

/// Host-side handle to the component instance that owns a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentRef(pub u64);

/// Component references a web sink updates directly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewRefSet {
    pub items: Vec<ComponentRef>,
}

impl ViewRefSet {
    #[must_use]
    pub fn single(component: ComponentRef) -> Self {
        Self {
            items: vec![component],
        }
    }
}

/// Everything the component layer knows about the view it renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewInfo {
    pub tag: ViewTag,
    pub name: String,
    pub node: Option<NativeRef>,
    pub config: Option<ViewConfig>,
    pub component: ComponentRef,
}

impl ViewInfo {
    #[must_use]
    pub fn new(tag: impl Into<ViewTag>, name: impl Into<String>, component: ComponentRef) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            node: None,
            config: None,
            component,
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: NativeRef) -> Self {
        self.node = Some(node);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ViewConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The descriptor this view contributes to a descriptor set.
    #[must_use]
    pub fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor {
            tag: self.tag,
            name: self.name.clone(),
            node: self.node,
        }
    }
}
