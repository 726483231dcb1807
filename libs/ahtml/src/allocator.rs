use std::{cell::RefCell,
          cmp::max,
          marker::PhantomData,
          sync::{atomic::{AtomicU32, Ordering}, Mutex}};

use anyhow::{anyhow, bail, Result};
use kstring::KString;

use crate::{myfrom::MyFrom, stillvec::StillVec};

#[derive(Debug)]
pub enum AllocKind {
    Att,
    Node,
    Id,
}

pub trait AllocatorType {
    fn allockind() -> AllocKind;
}

impl AllocatorType for (KString, KString) {
    fn allockind() -> AllocKind {
        AllocKind::Att
    }
}

impl AllocatorType for Node {
    fn allockind() -> AllocKind {
        AllocKind::Node
    }
}

impl<T> AllocatorType for AId<T> {
    fn allockind() -> AllocKind {
        AllocKind::Id
    }
}

/// Static description of an HTML element kind. Elements carry a
/// reference to one of these instead of a tag name copy.
#[derive(Debug, PartialEq, Eq)]
pub struct ElementMeta {
    pub tag_name: &'static str,
    /// Void elements (`<br>`, `<input>`, ..) serialize without a
    /// closing tag.
    pub has_closing_tag: bool,
}

/// Keeps cleared `HtmlAllocator`s around for reuse so the slot
/// storage is not reallocated for every request.
pub struct AllocatorPool {
    max_allocations: u32,
    allocators: Mutex<Vec<HtmlAllocator>>,
}

impl AllocatorPool {
    pub fn new(max_allocations: u32) -> AllocatorPool {
        AllocatorPool {
            max_allocations,
            allocators: Mutex::new(Vec::new()),
        }
    }

    pub fn get<'p>(&'p self) -> AllocatorGuard<'p> {
        let mut l = self.allocators.lock().expect("not poisoned");
        let a = l.pop();
        AllocatorGuard {
            pool: self,
            _allocator: a,
        }
    }
}

pub struct AllocatorGuard<'p> {
    pool: &'p AllocatorPool,
    _allocator: Option<HtmlAllocator>,
}

impl<'p> AllocatorGuard<'p> {
    pub fn allocator(&mut self) -> &HtmlAllocator {
        // Lazily allocating here keeps pool startup free; the guard
        // lifetime bounds all AId:s handed out, and drop() clears the
        // storage before anyone else can see it.
        if self._allocator.is_none() {
            self._allocator = Some(HtmlAllocator::new(self.pool.max_allocations));
        }
        self._allocator.as_mut().expect("just filled in")
    }
}

impl<'p> Drop for AllocatorGuard<'p> {
    fn drop(&mut self) {
        if let Some(mut a) = self._allocator.take() {
            // Retire old allocators instead of hoarding their memory
            // forever.
            if a.regionid.generation < 20 {
                a.clear();
                let mut l = self.pool.allocators.lock().expect("not poisoned");
                l.push(a);
            }
        }
    }
}

static NEXT_ALLOCATOR_ID: AtomicU32 = AtomicU32::new(0);

fn next_allocator_id() -> u32 {
    NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifies one allocator in one generation; `AId`s remember it so
/// use with the wrong or a cleared allocator panics instead of
/// resolving to an unrelated node.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RegionId {
    allocator_id: u32,
    generation: u32,
}

/// Region-allocating store for one HTML document or fragment.
pub struct HtmlAllocator {
    regionid: RegionId,
    // Attribute and node storage; never moves while shared refs exist.
    atts: StillVec<Option<(KString, KString)>>,
    nodes: StillVec<Option<Node>>,
    // Backing store for `AVec`/`ASlice`: bare ids into atts or nodes,
    // depending on the slot's type parameter.
    ids: RefCell<Vec<u32>>,
    // Scratch buffer for serialization.
    pub(crate) html_escape_tmp: RefCell<Vec<u8>>,
}

pub trait ToASlice<T> {
    fn to_aslice(self, allocator: &HtmlAllocator) -> Result<ASlice<T>>;
}

impl HtmlAllocator {
    pub fn new(max_allocations: u32) -> Self {
        let max_allocations = max_allocations as usize;
        HtmlAllocator {
            regionid: RegionId {
                allocator_id: next_allocator_id(),
                generation: 0,
            },
            // Attributes are much rarer than nodes.
            atts: StillVec::with_capacity(max_allocations / 2),
            nodes: StillVec::with_capacity(max_allocations),
            ids: RefCell::new(Vec::with_capacity(max_allocations)),
            html_escape_tmp: RefCell::new(Vec::new()),
        }
    }

    pub fn clear(&mut self) {
        self.atts.exclusive_clear();
        self.nodes.exclusive_clear();
        self.ids.borrow_mut().clear();
        self.regionid.generation += 1;
    }

    pub fn regionid(&self) -> RegionId {
        self.regionid
    }

    pub fn assert_regionid(&self, rid: RegionId) {
        if rid != self.regionid {
            panic!("regionid mismatch")
        }
    }

    fn id_to_bare<T>(&self, id: AId<T>) -> u32 {
        if self.regionid == id.regionid {
            id.id
        } else {
            panic!("AId with incompatible RegionId used: expected {:?}, got {:?}",
                   self.regionid, id.regionid);
        }
    }

    fn id_to_index<T>(&self, id: AId<T>) -> usize {
        self.id_to_bare(id) as usize
    }

    fn set_id<T: AllocatorType>(&self, slot: u32, val: AId<T>) {
        self.ids.borrow_mut()[slot as usize] = self.id_to_bare(val);
    }

    pub fn get_node<'a>(&'a self, id: AId<Node>) -> Option<&'a Node> {
        self.nodes.get(self.id_to_index(id))?.as_ref()
    }

    pub fn get_att<'a>(&'a self, id: AId<(KString, KString)>)
                       -> Option<&'a (KString, KString)> {
        self.atts.get(self.id_to_index(id))?.as_ref()
    }

    /// Read an `AId<T>` back out of the id table. The slot is trusted
    /// to hold an id of the requested kind.
    pub fn get_id<T: AllocatorType>(&self, slot: u32) -> Option<AId<T>> {
        self.ids.borrow().get(slot as usize)
            .map(|id2| AId::new(self.regionid, *id2))
    }

    pub fn new_vec<'a, T: AllocatorType>(&'a self) -> AVec<'a, T> {
        AVec::new(self)
    }

    /// Reserve `n` id slots; with `copy_range`, the old range is
    /// copied to the front of the new one (realloc for `AVec` growth).
    fn alloc(&self, n: u32, copy_range: Option<(u32, u32)>) -> Result<u32> {
        let mut v = self.ids.borrow_mut();
        let id = v.len();
        let newlen = id + n as usize;
        if newlen > v.capacity() {
            bail!("HtmlAllocator: out of memory")
        }
        if let Some((start, end)) = copy_range {
            assert!(end - start < n);
            // Within capacity as per the check above, hence no
            // reallocation.
            v.extend_from_within(start as usize..end as usize);
        }
        // Fill the remainder; u32::MAX marks never-written slots.
        v.resize(newlen, u32::MAX);
        Ok(id as u32)
    }

    pub fn new_element(
        &self,
        meta: &'static ElementMeta,
        attr: ASlice<(KString, KString)>,
        body: ASlice<Node>,
    ) -> Result<AId<Node>> {
        self.store_node(Node::Element(Element { meta, attr, body }))
    }

    fn store_node(&self, node: Node) -> Result<AId<Node>> {
        let id = self.nodes.len();
        self.nodes.try_push(Some(node))
            .map_err(|_| anyhow!("HtmlAllocator: out of memory"))?;
        Ok(AId::new(self.regionid, id as u32))
    }

    fn new_string(&self, s: KString) -> Result<AId<Node>> {
        self.store_node(Node::String(s))
    }

    pub fn empty_node(&self) -> Result<AId<Node>> {
        self.store_node(Node::None)
    }

    pub fn new_attribute(&self, att: (KString, KString))
                         -> Result<AId<(KString, KString)>> {
        let id = self.atts.len();
        self.atts.try_push(Some(att))
            .map_err(|_| anyhow!("HtmlAllocator: out of memory"))?;
        Ok(AId::new(self.regionid, id as u32))
    }

    pub fn attribute<K, V>(&self, key: K, val: V)
                           -> Result<AId<(KString, KString)>>
    where KString: MyFrom<K> + MyFrom<V>
    {
        self.new_attribute((KString::myfrom(key), KString::myfrom(val)))
    }

    pub fn staticstr(&self, s: &'static str) -> Result<AId<Node>> {
        self.new_string(KString::from_static(s))
    }

    pub fn str(&self, s: &str) -> Result<AId<Node>> {
        self.new_string(KString::from_ref(s))
    }

    pub fn text<T>(&self, s: T) -> Result<AId<Node>>
    where KString: MyFrom<T>
    {
        self.new_string(KString::myfrom(s))
    }

    pub fn string(&self, s: String) -> Result<AId<Node>> {
        self.new_string(KString::from(s))
    }

    pub fn opt_string(&self, s: Option<String>) -> Result<AId<Node>> {
        match s {
            Some(s) => self.new_string(KString::from(s)),
            None => self.empty_node(),
        }
    }

    pub fn kstring(&self, s: KString) -> Result<AId<Node>> {
        self.new_string(s)
    }

    /// Create an element from anything slice-able, for nice to use
    /// syntax (arrays of `att()` results and of child ids).
    pub fn element(
        &self,
        meta: &'static ElementMeta,
        attr: impl ToASlice<(KString, KString)>,
        body: impl ToASlice<Node>,
    ) -> Result<AId<Node>> {
        self.new_element(meta, attr.to_aslice(self)?, body.to_aslice(self)?)
    }

    /// A text node with just a non-breaking space.
    pub fn nbsp(&self) -> Result<AId<Node>> {
        self.str("\u{00A0}")
    }

    pub fn empty_slice<T>(&self) -> ASlice<T> {
        ASlice {
            t: PhantomData,
            regionid: self.regionid,
            len: 0,
            start: 0,
        }
    }
}

#[derive(Debug)]
pub struct AId<T> {
    t: PhantomData<fn() -> T>,
    regionid: RegionId,
    id: u32,
}

impl<T: AllocatorType> AId<T> {
    fn new(regionid: RegionId, id: u32) -> AId<T> {
        AId { t: PhantomData, regionid, id }
    }
}

// derive would put bounds on T, do it manually:
impl<T> Clone for AId<T> {
    fn clone(&self) -> Self {
        Self { t: PhantomData, regionid: self.regionid, id: self.id }
    }
}
impl<T> Copy for AId<T> {}

/// A growable vector of `AId<T>`s whose storage lives in the
/// allocator's id table. Finish with `as_slice()`.
pub struct AVec<'a, T: AllocatorType> {
    t: PhantomData<T>,
    allocator: &'a HtmlAllocator,
    len: u32,
    cap: u32,
    start: u32,
}

impl<'a, T: AllocatorType> AVec<'a, T> {
    pub fn new(allocator: &'a HtmlAllocator) -> AVec<'a, T> {
        AVec {
            t: PhantomData,
            allocator,
            len: 0,
            cap: 0,
            start: 0,
        }
    }

    #[inline(always)]
    pub fn allocator(&self) -> &'a HtmlAllocator {
        self.allocator
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, itemid: AId<T>) -> Result<()> {
        if self.len == self.cap {
            let newcap = max(self.cap * 2, 8);
            let newstart = self.allocator.alloc(
                newcap,
                Some((self.start, self.start + self.len)))?;
            self.start = newstart;
            self.cap = newcap;
        }
        self.allocator.set_id(self.start + self.len, itemid);
        self.len += 1;
        Ok(())
    }

    pub fn extend_from_slice(&mut self, slice: &ASlice<T>) -> Result<()> {
        for aid in slice.iter_aid(self.allocator) {
            self.push(aid)?;
        }
        Ok(())
    }

    pub fn as_slice(&self) -> ASlice<T> {
        ASlice {
            t: PhantomData,
            regionid: self.allocator.regionid,
            len: self.len,
            start: self.start,
        }
    }
}

/// A finished range of stored `AId<T>`s. Carries no allocator
/// reference, so iteration takes one.
#[derive(Debug)]
pub struct ASlice<T> {
    t: PhantomData<fn() -> T>,
    regionid: RegionId,
    pub(crate) len: u32,
    pub(crate) start: u32,
}

impl<T> Clone for ASlice<T> {
    fn clone(&self) -> Self {
        Self { t: self.t, regionid: self.regionid, len: self.len, start: self.start }
    }
}
impl<T> Copy for ASlice<T> {}

pub struct ASliceNodeIterator<'a, T> {
    allocator: &'a HtmlAllocator,
    t: PhantomData<T>,
    id: u32,
    id_end: u32,
}

impl<'a, T> Iterator for ASliceNodeIterator<'a, T> {
    type Item = &'a Node;
    fn next(&mut self) -> Option<&'a Node> {
        if self.id < self.id_end {
            let r = self.allocator.get_id(self.id).expect(
                "slice points to allocated storage");
            let v = self.allocator.get_node(r).expect(
                "stored ids resolve");
            self.id += 1;
            Some(v)
        } else {
            None
        }
    }
}

pub struct ASliceAttIterator<'a, T> {
    allocator: &'a HtmlAllocator,
    t: PhantomData<T>,
    id: u32,
    id_end: u32,
}

impl<'a, T> Iterator for ASliceAttIterator<'a, T> {
    type Item = &'a (KString, KString);
    fn next(&mut self) -> Option<&'a (KString, KString)> {
        if self.id < self.id_end {
            let r = self.allocator.get_id(self.id).expect(
                "slice points to allocated storage");
            let v = self.allocator.get_att(r).expect(
                "stored ids resolve");
            self.id += 1;
            Some(v)
        } else {
            None
        }
    }
}

pub struct ASliceAIdIterator<'a, T> {
    allocator: &'a HtmlAllocator,
    t: PhantomData<T>,
    id: u32,
    id_end: u32,
}

impl<'a, T: AllocatorType> Iterator for ASliceAIdIterator<'a, T> {
    type Item = AId<T>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.id < self.id_end {
            let r = self.allocator.get_id(self.id).expect(
                "slice points to allocated storage");
            self.id += 1;
            Some(r)
        } else {
            None
        }
    }
}

impl<'a, T: AllocatorType> IntoIterator for &AVec<'a, T> {
    type Item = AId<T>;
    type IntoIter = ASliceAIdIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        ASliceAIdIterator {
            allocator: self.allocator,
            t: PhantomData,
            id: self.start,
            id_end: self.start + self.len,
        }
    }
}

impl<'a, T: AllocatorType> ASlice<T> {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter_node(&self, allocator: &'a HtmlAllocator) -> ASliceNodeIterator<'a, T> {
        allocator.assert_regionid(self.regionid);
        ASliceNodeIterator {
            allocator,
            t: PhantomData,
            id: self.start,
            id_end: self.start + self.len,
        }
    }

    pub fn iter_att(&self, allocator: &'a HtmlAllocator) -> ASliceAttIterator<'a, T> {
        allocator.assert_regionid(self.regionid);
        ASliceAttIterator {
            allocator,
            t: PhantomData,
            id: self.start,
            id_end: self.start + self.len,
        }
    }

    pub fn iter_aid(&self, allocator: &'a HtmlAllocator) -> ASliceAIdIterator<'a, T> {
        ASliceAIdIterator {
            allocator,
            t: PhantomData,
            id: self.start,
            id_end: self.start + self.len,
        }
    }

    pub fn get(&self, i: u32, allocator: &'a HtmlAllocator) -> Option<AId<T>> {
        if i < self.len {
            allocator.get_id(self.start + i)
        } else {
            None
        }
    }
}

/// Lives inside an allocator only, hence no allocator field.
#[derive(Debug)]
pub enum Node {
    Element(Element),
    String(KString),
    None,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::String(_) => None,
            Node::None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub meta: &'static ElementMeta,
    pub attr: ASlice<(KString, KString)>,
    pub body: ASlice<Node>,
}

impl Element {
    pub fn meta(&self) -> &'static ElementMeta {
        self.meta
    }
    pub fn attr(&self) -> &ASlice<(KString, KString)> {
        &self.attr
    }
    pub fn body(&self) -> &ASlice<Node> {
        &self.body
    }
}
