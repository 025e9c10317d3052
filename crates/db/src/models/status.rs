//! Text-backed status enums stored in `CHECK`-constrained columns.
//!
//! Each variant's string is both its serde name and its database value.

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $val)]
                #[sqlx(rename = $val)]
                $variant
            ),+
        }

        impl $name {
            /// Return the database value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $val ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Job lifecycle: `pending → processing → completed | failed`.
    JobStatus {
        Pending = "pending",
        Processing = "processing",
        Completed = "completed",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Author of a conversation message.
    MessageRole {
        User = "user",
        Assistant = "assistant",
    }
}

impl JobStatus {
    /// Terminal jobs accept no further writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
