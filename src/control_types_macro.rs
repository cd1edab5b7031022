/// Generates a control role enum for a reshapable group, the five slots in
/// reshape order, along with its `ControlRole` implementation.
///
/// Role identifiers are the variant names themselves; they are what profiles
/// and configuration front-ends use to address a control reference, so they
/// must stay stable. Parsing is ASCII case insensitive.
#[macro_export]
macro_rules! define_control_roles {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            positive_y: $up:ident,
            negative_y: $down:ident,
            negative_x: $left:ident,
            positive_x: $right:ident,
            modifier: $modifier:ident $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            PartialEq,
            Eq,
            Hash,
            Clone,
            Copy,
            ::strum_macros::EnumString,
            ::strum_macros::Display
        )]
        #[strum(ascii_case_insensitive)]
        $vis enum $name {
            $up,
            $down,
            $left,
            $right,
            $modifier,
        }

        impl $crate::reshapable::ControlRole for $name {
            const ALL: [Self; $crate::reshapable::ROLE_SLOTS] = [
                Self::$up,
                Self::$down,
                Self::$left,
                Self::$right,
                Self::$modifier,
            ];
            const POSITIVE_Y: Self = Self::$up;
            const NEGATIVE_Y: Self = Self::$down;
            const NEGATIVE_X: Self = Self::$left;
            const POSITIVE_X: Self = Self::$right;
            const MODIFIER: Self = Self::$modifier;

            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    Self::$up => stringify!($up),
                    Self::$down => stringify!($down),
                    Self::$left => stringify!($left),
                    Self::$right => stringify!($right),
                    Self::$modifier => stringify!($modifier),
                }
            }
        }
    };
}
