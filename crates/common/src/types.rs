use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a committed order.
    OrderId
);

uuid_id!(
    /// Identifier of an authenticated user.
    UserId
);

uuid_id!(
    /// Identifier of whoever performed a status change (operator, service account or buyer).
    ActorId
);

impl From<UserId> for ActorId {
    fn from(user: UserId) -> Self {
        Self(user.as_uuid())
    }
}

/// Catalog identifier of a product variant.
///
/// Variants are keyed by the catalog's integer primary key; the ordering
/// is what checkout uses to lock rows in a stable sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(i64);

impl VariantId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VariantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a configured payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodId(i64);

impl PaymentMethodId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PaymentMethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PaymentMethodId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Opaque session token of an anonymous shopper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who is buying: an authenticated user or an anonymous session, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BuyerIdentity {
    User(UserId),
    Guest(SessionId),
}

impl BuyerIdentity {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            BuyerIdentity::User(id) => Some(*id),
            BuyerIdentity::Guest(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            BuyerIdentity::User(_) => None,
            BuyerIdentity::Guest(session) => Some(session),
        }
    }

    /// Rebuilds an identity from the two nullable columns an order row carries.
    ///
    /// Returns `None` unless exactly one of them is present.
    pub fn from_parts(user_id: Option<UserId>, session_id: Option<SessionId>) -> Option<Self> {
        match (user_id, session_id) {
            (Some(user), None) => Some(BuyerIdentity::User(user)),
            (None, Some(session)) => Some(BuyerIdentity::Guest(session)),
            _ => None,
        }
    }
}

impl std::fmt::Display for BuyerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuyerIdentity::User(id) => write!(f, "user:{id}"),
            BuyerIdentity::Guest(session) => write!(f, "guest:{session}"),
        }
    }
}
