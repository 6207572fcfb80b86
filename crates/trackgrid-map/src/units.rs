macro_rules! def_units {
    ($t: ident, $doc: literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub struct $t<T>(pub T);

        impl<T> $t<T> {
            pub fn into_inner(self) -> T {
                self.0
            }
        }
    };
}

def_units!(
    WorldUnits,
    "Denotes that the inner `T` is given in the world coordinates of the view layer."
);
def_units!(
    CellUnits,
    "Denotes that the inner `T` is given in grid cell indices."
);
