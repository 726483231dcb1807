//! A small-size-optimized group of nodes, for functions that usually
//! return zero, one or two nodes but sometimes a whole slice.

use anyhow::Result;

use crate::allocator::{AId, ASlice, AVec, AllocatorType, HtmlAllocator,
                       ToASlice};

#[derive(Debug, Clone, Copy)]
pub enum Flat<T> {
    None,
    One(AId<T>),
    Two(AId<T>, AId<T>),
    Slice(ASlice<T>),
}

impl<T: AllocatorType> ToASlice<T> for Flat<T> {
    fn to_aslice(self, allocator: &HtmlAllocator) -> Result<ASlice<T>> {
        match self {
            Flat::None => Ok(allocator.empty_slice()),
            Flat::One(a) => {
                let mut v = allocator.new_vec();
                v.push(a)?;
                Ok(v.as_slice())
            }
            Flat::Two(a, b) => {
                let mut v = allocator.new_vec();
                v.push(a)?;
                v.push(b)?;
                Ok(v.as_slice())
            }
            Flat::Slice(s) => Ok(s),
        }
    }
}

impl<'a, T: AllocatorType> AVec<'a, T> {
    pub fn push_flat(&mut self, flat: Flat<T>) -> Result<()> {
        match flat {
            Flat::None => Ok(()),
            Flat::One(a) => self.push(a),
            Flat::Two(a, b) => {
                self.push(a)?;
                self.push(b)
            }
            Flat::Slice(s) => self.extend_from_slice(&s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att;

    #[test]
    fn t_push_flat() -> Result<()> {
        let html = HtmlAllocator::new(1000);
        let mut v = html.new_vec();
        v.push_flat(Flat::None)?;
        v.push_flat(Flat::One(html.str("a")?))?;
        v.push_flat(Flat::Two(html.str("b")?, html.str("c")?))?;
        let mut w = html.new_vec();
        w.push(html.str("d")?)?;
        v.push_flat(Flat::Slice(w.as_slice()))?;
        let id = html.div([att("class", "x")], v.as_slice())?;
        assert_eq!(html.to_html_string(id, false),
                   "<div class=\"x\">abcd</div>");
        Ok(())
    }
}
