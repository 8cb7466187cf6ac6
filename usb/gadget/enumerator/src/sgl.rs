//! Scatter/gather helpers for descriptor responses.
//!
//! A response is assembled from several independently owned buffers (a two byte header array,
//! the packed body of a descriptor, whatever an interface hands back) without copying them into
//! one contiguous buffer. The host's wLength may be shorter than the whole response, so the list
//! has to be cut at an arbitrary byte boundary that may fall inside any one fragment.
//!
//! See: <https://en.wikipedia.org/wiki/Gather/scatter_(vector_addressing)>

use smallvec::SmallVec;

/// Total number of elements viewed by a scatter list. O(number of fragments).
pub fn scatter_span_size<T>(spans: &[&[T]]) -> usize {
    spans.iter().map(|span| span.len()).sum()
}

/// A prefix of a fixed-size scatter list.
///
/// Holds the spans covering the first `count` elements of the original list and how many of them
/// are in use. The last used span may be a truncated view of the original one.
#[derive(Clone, Copy, Debug)]
pub struct SubScatter<'a, T, const N: usize> {
    spans: [&'a [T]; N],
    used: usize,
}

pub type SubScatterBytes<'a, const N: usize> = SubScatter<'a, u8, N>;

impl<'a, T, const N: usize> SubScatter<'a, T, N> {
    /// The spans in use.
    pub fn as_slice(&self) -> &[&'a [T]] {
        &self.spans[..self.used]
    }

    /// Number of spans in use.
    pub fn span_count(&self) -> usize {
        self.used
    }

    /// Number of elements viewed by the spans in use.
    pub fn len(&self) -> usize {
        scatter_span_size(self.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> ([&'a [T]; N], usize) {
        (self.spans, self.used)
    }
}

/// Takes the first `count` elements of `spans`.
///
/// If `count` meets or exceeds the total, every span is returned unmodified.
pub fn make_sub_scatter_array<'a, T, const N: usize>(
    count: usize,
    spans: [&'a [T]; N],
) -> SubScatter<'a, T, N> {
    if scatter_span_size(&spans) <= count {
        return SubScatter { spans, used: N };
    }

    let mut out: [&'a [T]; N] = [&[]; N];
    let mut used = 0;
    let mut remaining = count;
    for span in spans {
        if remaining == 0 {
            break;
        }
        let take = span.len().min(remaining);
        out[used] = &span[..take];
        used += 1;
        remaining -= take;
    }

    SubScatter { spans: out, used }
}

/// [make_sub_scatter_array] over byte spans.
pub fn make_sub_scatter_bytes<'a, const N: usize>(
    count: usize,
    spans: [&'a [u8]; N],
) -> SubScatterBytes<'a, N> {
    make_sub_scatter_array(count, spans)
}

/// Like [make_sub_scatter_bytes], for a scatter list whose length is only known at runtime.
///
/// Empty spans are dropped so the result never looks like a zero-length packet unless `count`
/// is zero.
pub fn take_scatter_bytes<'a>(spans: &[&'a [u8]], count: usize) -> SmallVec<[&'a [u8]; 8]> {
    let mut out = SmallVec::new();
    let mut remaining = count;
    for span in spans {
        if remaining == 0 {
            break;
        }
        if span.is_empty() {
            continue;
        }
        let take = span.len().min(remaining);
        out.push(&span[..take]);
        remaining -= take;
    }
    out
}
