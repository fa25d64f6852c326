//! The declarative schema machinery: rather than building entities
//! by reflective attribute assignment (the approach `original_source/twittytwister/streaming.py`
//! takes, with `TwitterObject.fromDict` dispatching on `SIMPLE_PROPS`/`COMPLEX_PROPS`/
//! `LIST_PROPS` class attributes), the `entity!` macro below expands a field table into a plain
//! struct plus a generic `from_value` decoder that performs the same three-way dispatch at
//! compile time. Schema cycles (`Status` ↔ `User`) are resolved by boxing: each type
//! names the other only by reference (`Box<Status>`/`Box<User>`), never by nested definition, so
//! the two `entity!` invocations can be declared independently and linked simply by both
//! existing in the same crate.

/// Declares one or more Twitter entity types from a field table.
///
/// Each invocation lists three kinds of attribute:
/// - `simple`: scalars copied verbatim from the JSON value via `serde_json::from_value`.
/// - `complex` / `complex(boxed)`: a single nested entity, decoded by recursing into that
///   entity's own `from_value`. `boxed` is used at the two points in the schema that would
///   otherwise make the type infinite-sized (`Status::retweeted_status`, `Status::user`,
///   `User::status`).
/// - `list`: a JSON array of nested entities, decoded element-wise.
///
/// Every generated struct also carries a `raw: serde_json::Map<String, serde_json::Value>`
/// field holding the entire input object, so unknown keys are never lost.
macro_rules! entity {
    (
        $(
            $(#[$attr:meta])*
            pub struct $Name:ident {
                simple { $($sfield:ident : $sty:ty),* $(,)? }
                complex { $($cfield:ident : $cty:ty),* $(,)? }
                boxed { $($bfield:ident : $bty:ty),* $(,)? }
                list { $($lfield:ident : $lty:ty),* $(,)? }
            }
        )*
    ) => {
        $(
            $(#[$attr])*
            #[derive(Clone, Debug, Default, PartialEq)]
            pub struct $Name {
                $(pub $sfield: Option<$sty>,)*
                $(pub $cfield: Option<$cty>,)*
                $(pub $bfield: Option<Box<$bty>>,)*
                $(pub $lfield: Vec<$lty>,)*
                /// The entire decoded JSON object, including keys not named above.
                pub raw: ::serde_json::Map<String, ::serde_json::Value>,
            }

            impl $Name {
                #[doc = concat!(
                    "Materializes a `", stringify!($Name), "` from a JSON value per the field ",
                    "table above. A non-object value yields a value with every field empty and ",
                    "an empty `raw` map."
                )]
                pub fn from_value(value: &::serde_json::Value) -> Self {
                    let mut out = $Name::default();
                    let map = match value.as_object() {
                        Some(m) => m,
                        None => return out,
                    };
                    out.raw = map.clone();

                    for (key, val) in map {
                        match key.as_str() {
                            $(
                                stringify!($sfield) => {
                                    out.$sfield = ::serde_json::from_value(val.clone()).ok();
                                }
                            )*
                            $(
                                stringify!($cfield) => {
                                    out.$cfield = Some(<$cty>::from_value(val));
                                }
                            )*
                            $(
                                stringify!($bfield) => {
                                    out.$bfield = Some(Box::new(<$bty>::from_value(val)));
                                }
                            )*
                            $(
                                stringify!($lfield) => {
                                    out.$lfield = val
                                        .as_array()
                                        .map(|items| items.iter().map(<$lty>::from_value).collect())
                                        .unwrap_or_default();
                                }
                            )*
                            _ => {
                                // Unknown key: left out of the typed fields, but still present
                                // in `raw` above.
                            }
                        }
                    }

                    out
                }
            }
        )*
    };
}
