//! Series/parallel task compositions
//!
//! A [`Composition`] is the explicit tree form of "run these in order" and
//! "run these together". Compositions reference tasks by name and are only
//! turned into something runnable by the resolver.

use std::fmt;

/// A tree of task references combined sequentially or in parallel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    /// A single registered task, referenced by name.
    Task(String),
    /// Each child completes before the next one starts.
    Series(Vec<Composition>),
    /// All children start together; the group joins at the end.
    Parallel(Vec<Composition>),
}

impl Composition {
    pub fn task(name: impl Into<String>) -> Self {
        Self::Task(name.into())
    }

    pub fn series<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Composition>,
    {
        Self::Series(children.into_iter().map(Into::into).collect())
    }

    pub fn parallel<I, C>(children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Composition>,
    {
        Self::Parallel(children.into_iter().map(Into::into).collect())
    }

    /// Every task name referenced anywhere in the tree, in declaration order.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_task_names(&mut names);
        names
    }

    fn collect_task_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Task(name) => names.push(name),
            Self::Series(children) | Self::Parallel(children) => {
                for child in children {
                    child.collect_task_names(names);
                }
            }
        }
    }
}

impl From<&str> for Composition {
    fn from(name: &str) -> Self {
        Self::Task(name.to_string())
    }
}

impl From<String> for Composition {
    fn from(name: String) -> Self {
        Self::Task(name)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, children) = match self {
            Self::Task(name) => return write!(f, "{}", name),
            Self::Series(children) => ("series", children),
            Self::Parallel(children) => ("parallel", children),
        };
        write!(f, "{}(", label)?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, ")")
    }
}
