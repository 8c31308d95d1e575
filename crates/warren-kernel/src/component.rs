//! The component model: capability roles, the object-safe [`Component`]
//! trait, and the process-wide type registry used for save/load.
//!
//! Every component is a tagged data record owned by one entity. Instead of
//! runtime type introspection, each concrete type declares a capability-role
//! set at compile time ([`ComponentKind::ROLES`]); the store indexes a
//! component under its concrete type name and every declared role, so
//! broader-role queries (scheduled actors, event listeners, driving
//! behaviors) never scan or downcast speculatively.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::behavior::Behavior;
use crate::entity::{ComponentId, EntityId};
use crate::event::Event;
use crate::schedule::Actor;
use crate::KernelError;

/// A capability tag a component can be queried by, e.g. `"actor"`.
///
/// Roles are compile-time string constants; the concrete type name acts as an
/// implicit extra role.
pub type Role = &'static str;

// ---------------------------------------------------------------------------
// ComponentMeta
// ---------------------------------------------------------------------------

/// Common header embedded in every concrete component.
///
/// The `id` starts as [`ComponentId::UNASSIGNED`] and is filled in by the
/// store on insertion. Serialized together with the component's own fields so
/// identity survives save/load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComponentMeta {
    /// Unique component id, assigned on insertion.
    pub id: ComponentId,
    /// The owning entity.
    pub entity: EntityId,
}

impl ComponentMeta {
    /// Header for a component that has not been inserted yet.
    pub fn new(entity: EntityId) -> Self {
        Self {
            id: ComponentId::UNASSIGNED,
            entity,
        }
    }
}

// ---------------------------------------------------------------------------
// Component / ComponentKind
// ---------------------------------------------------------------------------

/// Object-safe trait implemented by every component type.
///
/// The `as_*` capability views replace dynamic class checks: a component that
/// participates in scheduling overrides [`as_actor`](Component::as_actor), a
/// driving behavior overrides [`as_behavior`](Component::as_behavior), and so
/// on. The defaults return `None`, so a component only pays for the
/// capabilities it declares.
///
/// Use [`impl_component!`](crate::impl_component) to generate the
/// boilerplate from a `meta` field.
pub trait Component: Any + fmt::Debug {
    /// The common header (id + owning entity).
    fn meta(&self) -> &ComponentMeta;
    /// Mutable access to the header. Only the store assigns ids.
    fn meta_mut(&mut self) -> &mut ComponentMeta;
    /// Registered concrete type name.
    fn type_name(&self) -> &'static str;
    /// Declared capability roles (not including the concrete type name).
    fn roles(&self) -> &'static [Role];
    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// This component's unique id.
    fn id(&self) -> ComponentId {
        self.meta().id
    }

    /// The entity that owns this component.
    fn entity(&self) -> EntityId {
        self.meta().entity
    }

    /// Scheduled-actor view, if this component carries a [`crate::schedule::Schedule`].
    fn as_actor(&self) -> Option<&dyn Actor> {
        None
    }

    /// Mutable scheduled-actor view.
    fn as_actor_mut(&mut self) -> Option<&mut dyn Actor> {
        None
    }

    /// Driving-behavior view, if this component can sit on the behavior stack.
    fn as_behavior(&self) -> Option<&dyn Behavior> {
        None
    }

    /// Mutable driving-behavior view.
    fn as_behavior_mut(&mut self) -> Option<&mut dyn Behavior> {
        None
    }

    /// One-shot event view, if this component is consumed by dispatch.
    fn as_event(&self) -> Option<&dyn Event> {
        None
    }
}

/// Static half of the component model: the registered type name and the
/// declared role set, usable where a concrete type is known at compile time
/// (typed store queries, registry construction).
pub trait ComponentKind: Component + Sized {
    /// Registered concrete type name. Unique per process.
    const TYPE_NAME: &'static str;
    /// Declared capability roles.
    const ROLES: &'static [Role];
}

/// Implements [`Component`] and [`ComponentKind`] for a struct with a
/// `meta: ComponentMeta` field.
///
/// The optional trailing block supplies capability-view overrides:
///
/// ```
/// use warren_kernel::prelude::*;
///
/// #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// struct Hunger {
///     meta: ComponentMeta,
///     fullness: u32,
/// }
///
/// warren_kernel::impl_component!(Hunger, "hunger", []);
/// ```
#[macro_export]
macro_rules! impl_component {
    ($ty:ty, $name:expr, [$($role:expr),* $(,)?]) => {
        $crate::impl_component!($ty, $name, [$($role),*], {});
    };
    ($ty:ty, $name:expr, [$($role:expr),* $(,)?], { $($extra:tt)* }) => {
        impl $crate::component::ComponentKind for $ty {
            const TYPE_NAME: &'static str = $name;
            const ROLES: &'static [$crate::component::Role] = &[$($role),*];
        }

        impl $crate::component::Component for $ty {
            fn meta(&self) -> &$crate::component::ComponentMeta {
                &self.meta
            }
            fn meta_mut(&mut self) -> &mut $crate::component::ComponentMeta {
                &mut self.meta
            }
            fn type_name(&self) -> &'static str {
                <$ty as $crate::component::ComponentKind>::TYPE_NAME
            }
            fn roles(&self) -> &'static [$crate::component::Role] {
                <$ty as $crate::component::ComponentKind>::ROLES
            }
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
            $($extra)*
        }
    };
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

type SerializeFn = Box<dyn Fn(&dyn Component) -> Result<serde_json::Value, KernelError> + Send + Sync>;
type DeserializeFn =
    Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn Component>, KernelError> + Send + Sync>;

/// Metadata and (de)serialization hooks for one registered component type.
pub struct ComponentTypeInfo {
    /// Registered type name.
    pub name: &'static str,
    /// Declared capability roles.
    pub roles: &'static [Role],
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl ComponentTypeInfo {
    /// Serialize a component of this type to a JSON value.
    pub fn to_value(&self, component: &dyn Component) -> Result<serde_json::Value, KernelError> {
        (self.serialize)(component)
    }

    /// Reconstruct a component of this type from a JSON value.
    pub fn from_value(&self, value: &serde_json::Value) -> Result<Box<dyn Component>, KernelError> {
        (self.deserialize)(value)
    }
}

impl fmt::Debug for ComponentTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTypeInfo")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish()
    }
}

/// The static factory map for save/load: registered type name to serialize /
/// reconstruct functions. Built once at startup; an unresolvable name at load
/// time is a fatal error.
pub struct ComponentRegistry {
    by_name: HashMap<&'static str, ComponentTypeInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Register a component type under its [`ComponentKind::TYPE_NAME`].
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered; names are process-wide
    /// unique and registration happens once at startup.
    pub fn register<T>(&mut self)
    where
        T: ComponentKind + Clone + Serialize + DeserializeOwned,
    {
        let name = T::TYPE_NAME;
        if self.by_name.contains_key(name) {
            panic!("component type '{name}' is already registered");
        }
        let info = ComponentTypeInfo {
            name,
            roles: T::ROLES,
            serialize: Box::new(|component: &dyn Component| {
                let typed = component.as_any().downcast_ref::<T>().ok_or_else(|| {
                    KernelError::ComponentTypeMismatch {
                        id: component.id(),
                        expected: T::TYPE_NAME,
                    }
                })?;
                serde_json::to_value(typed).map_err(|e| KernelError::ComponentDeserialization {
                    name: T::TYPE_NAME.to_owned(),
                    details: e.to_string(),
                })
            }),
            deserialize: Box::new(|value: &serde_json::Value| {
                let typed: T = serde_json::from_value(value.clone()).map_err(|e| {
                    KernelError::ComponentDeserialization {
                        name: T::TYPE_NAME.to_owned(),
                        details: e.to_string(),
                    }
                })?;
                Ok(Box::new(typed) as Box<dyn Component>)
            }),
        };
        self.by_name.insert(name, info);
    }

    /// Look up a registered type by name.
    pub fn lookup(&self, name: &str) -> Option<&ComponentTypeInfo> {
        self.by_name.get(name)
    }

    /// All registered type names, sorted.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registered", &self.registered_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
