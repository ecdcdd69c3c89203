/// Declares a closed set of AMI field or event names.
///
/// Asterisk spells its keys in mixed case (`CallerIDNum`, `QueueStatusComplete`)
/// but older versions and some modules vary the casing, so `FromStr` matches
/// the wire spelling with `eq_ignore_ascii_case` after trimming surrounding
/// whitespace. `as_str()`, `Display` and `AsRef<str>` always yield the
/// canonical spelling used when a block is encoded. `ALL` lists every name
/// in declaration order.
///
/// The parse error is a tuple struct holding the rejected text, declared next
/// to the enum (see `ParseAmiFieldError`).
///
/// ```ignore
/// define_wire_enum! {
///     error_type: ParseQueueEventError,
///     /// Queue-side events.
///     pub enum QueueEvent {
///         Params => "QueueParams",
///         Member => "QueueMember",
///     }
/// }
/// assert_eq!("queueparams".parse(), Ok(QueueEvent::Params));
/// ```
macro_rules! define_wire_enum {
    (
        error_type: $Err:ident,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Every name, in declaration order.
            pub const ALL: &'static [$Name] = &[ $( $Name::$variant, )+ ];

            /// Canonical AMI spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key = s.trim();
                $(
                    if key.eq_ignore_ascii_case($wire) {
                        return Ok($Name::$variant);
                    }
                )+
                Err($Err(s.to_string()))
            }
        }
    };
}
