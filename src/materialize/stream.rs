//! Buffered and streaming drivers over joined rows
//!
//! Both drivers feed each row through a fresh [`RelationshipInstanceBuilder`]
//! and surface the root entity of a row only on the row where it became
//! canonical, so every logical root appears exactly once, in first-seen order.
//!
//! The streaming driver hands out roots as soon as they appear. Their
//! navigation properties keep filling in until the row source is exhausted,
//! because a later row can still link an already returned root to new
//! related entities.

use crate::config::MaterializeConfig;
use crate::error::MaterializeError;
use crate::executor::LifeError;
use crate::mapping::{EntityMapping, Shared};
use crate::materialize::builder::{MaterializeStats, RelationshipInstanceBuilder};
use crate::materialize::row::JoinedRow;
use std::iter::FusedIterator;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Register one row, end it, and return its root if it is newly canonical
fn feed<R: JoinedRow>(
    builder: &mut RelationshipInstanceBuilder,
    row: R,
) -> Result<Option<Shared<R::Root>>, MaterializeError> {
    let root = row.register(builder)?;
    builder.end_row()?;
    if root.is_duplicate() {
        return Ok(None);
    }
    Ok(root.into_unique_instance())
}

/// Materialize a whole result set and return its distinct root entities
///
/// `mappings` lists one mapping per lane of `R`, in lane order.
///
/// # Errors
///
/// Fails on the first row that does not match the declared mappings; no
/// partially linked graph is returned.
///
/// # Example
///
/// ```
/// use lifeline::mapping::{EntityMapping, Shared};
/// use lifeline::materialize::materialize;
/// use lifeline::MaterializeConfig;
///
/// #[derive(Default)]
/// struct Author { id: i32, books: Vec<Shared<Book>> }
/// #[derive(Default)]
/// struct Book { id: i32 }
///
/// let authors = EntityMapping::builder::<Author>("authors")
///     .key(|a: &Author| vec![a.id.into()])
///     .has_many(|a: &mut Author| &mut a.books)
///     .build()?;
/// let books = EntityMapping::builder::<Book>("books")
///     .key(|b: &Book| vec![b.id.into()])
///     .build()?;
///
/// let rows = vec![
///     (Some(Author { id: 1, ..Default::default() }), Some(Book { id: 1 })),
///     (Some(Author { id: 1, ..Default::default() }), Some(Book { id: 2 })),
///     (Some(Author { id: 2, ..Default::default() }), None),
/// ];
/// let authors = materialize([authors, books], rows, &MaterializeConfig::default())?;
///
/// assert_eq!(authors.len(), 2);
/// assert_eq!(authors[0].borrow().books.len(), 2);
/// assert!(authors[1].borrow().books.is_empty());
/// # Ok::<(), lifeline::MaterializeError>(())
/// ```
pub fn materialize<R, I>(
    mappings: impl IntoIterator<Item = Arc<EntityMapping>>,
    rows: I,
    config: &MaterializeConfig,
) -> Result<Vec<Shared<R::Root>>, MaterializeError>
where
    R: JoinedRow,
    I: IntoIterator<Item = R>,
{
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::materialize_span(R::LANES).entered();

    let mut builder = RelationshipInstanceBuilder::with_config(mappings, config);
    let mut roots = Vec::new();
    for row in rows {
        if let Some(root) = feed(&mut builder, row)? {
            roots.push(root);
        }
    }
    builder.finish();

    Ok(roots)
}

/// Streaming materialization over a fallible row source
///
/// Yields each distinct root entity on the row where it first appears. The
/// stream stops after the first error, whether it came from the row source or
/// from the builder.
pub struct GraphStream<I, R> {
    rows: I,
    builder: Option<RelationshipInstanceBuilder>,
    stats: Option<MaterializeStats>,
    _row: std::marker::PhantomData<fn() -> R>,
}

impl<I, R, E> GraphStream<I, R>
where
    I: Iterator<Item = Result<R, E>>,
    R: JoinedRow,
    E: Into<LifeError>,
{
    /// Wrap a row source; `mappings` lists one mapping per lane of `R`, in lane order
    pub fn new(
        mappings: impl IntoIterator<Item = Arc<EntityMapping>>,
        rows: impl IntoIterator<IntoIter = I>,
        config: &MaterializeConfig,
    ) -> Self {
        Self {
            rows: rows.into_iter(),
            builder: Some(RelationshipInstanceBuilder::with_config(mappings, config)),
            stats: None,
            _row: std::marker::PhantomData,
        }
    }

    /// Counters of the finished stream, once the row source is exhausted
    pub fn stats(&self) -> Option<MaterializeStats> {
        self.stats
    }
}

impl<I, R, E> Iterator for GraphStream<I, R>
where
    I: Iterator<Item = Result<R, E>>,
    R: JoinedRow,
    E: Into<LifeError>,
{
    type Item = Result<Shared<R::Root>, LifeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let builder = self.builder.as_mut()?;
            match self.rows.next() {
                None => {
                    self.stats = self.builder.take().map(RelationshipInstanceBuilder::finish);
                    return None;
                }
                Some(Err(e)) => {
                    self.builder = None;
                    return Some(Err(e.into()));
                }
                Some(Ok(row)) => match feed(builder, row) {
                    Ok(Some(root)) => return Some(Ok(root)),
                    Ok(None) => continue,
                    Err(e) => {
                        log::debug!("stopping graph stream: {e}");
                        self.builder = None;
                        return Some(Err(e.into()));
                    }
                },
            }
        }
    }
}

impl<I, R, E> FusedIterator for GraphStream<I, R>
where
    I: Iterator<Item = Result<R, E>>,
    R: JoinedRow,
    E: Into<LifeError>,
{
}
