//! Sealed integer ids, one distinct type per entity.
//!
//! A value of type `ProductId` cannot be passed where a `TagId` is expected,
//! even though both are `i64` underneath. Ids are unsealed (turned back into
//! a plain `i64`) only at the SQL boundary in `karl-db`.

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Unseal the id for use at the SQL boundary.
            #[must_use]
            pub fn unseal(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(SupermarketId);
entity_id!(ProductId);
entity_id!(ProductclassId);
entity_id!(ProductdetailsId);
entity_id!(ProductdetailsrecordId);
entity_id!(TagId);
entity_id!(TagcategoryId);
entity_id!(KaruserId);
entity_id!(SessionticketId);
entity_id!(SessionId);
entity_id!(ImageCitationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseal_round_trips() {
        let id = ProductId::new(42);
        assert_eq!(id.unseal(), 42);
    }

    #[test]
    fn distinct_types_do_not_compare() {
        let product_id = ProductId::new(1);
        let tag_id = TagId::new(1);
        assert_eq!(product_id.unseal(), tag_id.unseal());
        // The point of these newtypes is that the line below would not
        // compile: `assert_eq!(product_id, tag_id)`.
    }
}
