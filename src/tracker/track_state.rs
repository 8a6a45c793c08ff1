/// Shape of an assignment between two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentKind {
    /// Previous objects without counterpart (pushed out of the channel)
    #[default]
    Vanished,
    /// Current objects without predecessor
    Appeared,
    /// One previous object continues as one current object
    Continuation,
    /// One previous object divides into several current objects
    Division,
    /// Several previous objects fold into one current object
    Merge,
    /// Several previous objects against several current objects
    Complex,
}

impl AssignmentKind {
    pub fn from_counts(n_prev: usize, n_next: usize) -> Self {
        match (n_prev, n_next) {
            (_, 0) => Self::Vanished,
            (0, _) => Self::Appeared,
            (1, 1) => Self::Continuation,
            (1, _) => Self::Division,
            (_, 1) => Self::Merge,
            _ => Self::Complex,
        }
    }
}
