//! Small helpers shared across the crate.

use chrono::{DateTime, TimeZone, Utc};

/// Declares a string-backed enum that falls back to a `Custom(String)` variant for any value
/// not in its known set, the way `filter_level`/`with` parameters from the Streaming API do.
macro_rules! string_enums {
    (
        $(
            $(#[$attr:meta])*
            pub enum $E:ident {
                $(
                    $(#[$v_attr:meta])*
                    :$V:ident($by:expr) // The leading (ugly) colon is to suppress local ambiguity error.
                ),*;
                $(#[$u_attr:meta])*
                :$U:ident(_),
            }
        )*
    ) => {
        $(
            $(#[$attr])*
            pub enum $E {
                $(
                    $(#[$v_attr])*
                    $V,
                )*
                $(#[$u_attr])*
                $U(String),
            }

            impl<'de> ::serde::Deserialize<'de> for $E {
                fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> ::std::result::Result<Self, D::Error> {
                    struct V;

                    impl<'de> ::serde::de::Visitor<'de> for V {
                        type Value = $E;

                        fn visit_str<E: ::serde::de::Error>(self, s: &str) -> ::std::result::Result<$E, E> {
                            match s {
                                $($by => Ok($E::$V),)*
                                _ => Ok($E::$U(s.to_owned())),
                            }
                        }

                        fn expecting(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                            write!(f, "a string")
                        }
                    }

                    d.deserialize_str(V)
                }
            }

            impl ::std::convert::AsRef<str> for $E {
                fn as_ref(&self) -> &str {
                    match *self {
                        $($E::$V => $by,)*
                        $E::$U(ref s) => s,
                    }
                }
            }

            impl ::std::cmp::PartialEq for $E {
                fn eq(&self, other: &$E) -> bool {
                    self.as_ref() == other.as_ref()
                }
            }

            impl ::std::cmp::Eq for $E {}
        )*
    }
}

/// Parses Twitter's fixed `created_at` timestamp format.
///
/// Example: `"Mon May 01 00:00:00 +0000 2017"`.
pub fn parse_datetime(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
    Utc.datetime_from_str(s, "%a %b %e %H:%M:%S %z %Y")
}
