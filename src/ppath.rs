//! Paths independent of the local file system (pure
//! functions). E.g. for use in web applications.

//! Does not concern itself with handling ".." or ".", i.e. does not
//! offer canonicalization.

use std::fmt::Debug;

use ahtml::myfrom::MyFrom;

use crate::{path::path_segments, util::{first, rest}};

#[derive(Clone, Debug, PartialEq)]
pub struct PPath<Segment: Clone + Debug> {
    is_absolute: bool,
    ends_with_slash: bool,
    segments: Vec<Segment>, // without empty ones
}

impl<'s, T> PPath<T>
where T: MyFrom<&'s str> + Clone + Debug + 's
{
    pub fn from_str(s: &'s str) -> Self
    {
        let is_absolute = s.chars().next() == Some('/');
        let ends_with_slash = s.chars().last() == Some('/');
        PPath {
            is_absolute,
            ends_with_slash,
            segments: path_segments(s).map(|v| T::myfrom(v)).collect()
        }
    }
}

impl<T> PPath<T>
where T: AsRef<str> + Clone + Debug
{
    pub fn to_string(&self) -> String {
        let mut s = String::new();
        if self.is_absolute {
            s.push('/');
        }
        if self.segments.is_empty() {
            if ! self.is_absolute {
                s.push('.');
                if self.ends_with_slash {
                    s.push('/');
                }
            }
        } else {
            let mut seen = false;
            for p in &self.segments {
                if seen {
                    s.push('/');
                }
                s.push_str(p.as_ref());
                seen = true;
            }
            if self.ends_with_slash {
                s.push('/');
            }
        }
        s
    }

    pub fn contains_dot_or_dotdot(&self) -> bool {
        self.segments.iter().any(
            |s| {
                match s.as_ref() {
                    "." => true,
                    ".." => true,
                    _ => false
                }
            })
    }

    /// True if there are neither `.` nor `..` segments.
    pub fn is_canonical(&self) -> bool {
        ! self.contains_dot_or_dotdot()
    }

    /// More efficient than parsing `other` into a `PPath` and
    /// comparing afterwards, and ignores differences on is_absolute
    /// and ends_with_slash!
    pub fn same_document_as_path_str(&self, other: &str) -> bool {
        itertools::equal(self.segments.iter().map(|v| v.as_ref()),
                         path_segments(other))
    }
}

impl<P: Clone + Debug> PPath<P> {
    pub fn new(is_absolute: bool,
               ends_with_slash: bool,
               segments: Vec<P>
    ) -> Self {
        PPath { is_absolute, ends_with_slash, segments }
    }
    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }
    pub fn ends_with_slash(&self) -> bool {
        self.ends_with_slash
    }
    /// without empty ones
    pub fn segments(&self) -> &[P] {
        &self.segments
    }

    pub fn first(&self) -> Option<P> {
        first(&self.segments).cloned()
    }

    pub fn rest(&self) -> Option<Self> {
        Some(PPath {
            is_absolute: false,
            ends_with_slash: self.ends_with_slash,
            segments: rest(&self.segments)?.into(),
        })
    }
}
