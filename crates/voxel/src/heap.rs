use crate::HEAP_ALIGNMENT;

const NIL: u32 = u32::MAX;

const HEAD_WORD: usize = 0;
const TOTAL_WORD: usize = 1;
const USED_WORD: usize = 2;
const LIVE_WORD: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HeapError
{
    #[error(
        "heap exhausted: requested {requested} bytes, largest free block is {largest_free} bytes"
    )]
    OutOfMemory
    {
        requested: u32, largest_free: u32
    }
}

/// Byte 0 holds the header `[free head, total bytes, bytes in use, live
/// allocations]`. Free blocks store `[size, next]` in their first two words
/// and are kept sorted by address. All offsets and sizes are in bytes and
/// multiples of `HEAP_ALIGNMENT`.
#[derive(Clone)]
pub struct Heap
{
    words: Vec<u32>
}

impl std::fmt::Debug for Heap
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(
            f,
            "Heap {{ used: {} / {} | live: {} }}",
            self.get_used_bytes(),
            self.get_arena_bytes(),
            self.get_live_allocations()
        )
    }
}

impl Heap
{
    pub const HEADER_BYTES: u32 = 16;

    pub fn new(total_bytes: u32) -> Heap
    {
        let total_bytes = total_bytes & !(HEAP_ALIGNMENT - 1);

        assert!(
            total_bytes >= Self::HEADER_BYTES + HEAP_ALIGNMENT,
            "Heap of {total_bytes} bytes cannot hold a single allocation"
        );

        let mut this = Heap {
            words: vec![0; total_bytes as usize / 4]
        };

        this.reset();

        this
    }

    pub fn reset(&mut self)
    {
        self.words.fill(0);

        let total = self.get_total_bytes_from_len();

        self.words[HEAD_WORD] = Self::HEADER_BYTES;
        self.words[TOTAL_WORD] = total;
        self.words[USED_WORD] = 0;
        self.words[LIVE_WORD] = 0;

        self.write_block(Self::HEADER_BYTES, total - Self::HEADER_BYTES, NIL);
    }

    pub fn round_size(size: u32) -> Option<u32>
    {
        size.max(1).checked_next_multiple_of(HEAP_ALIGNMENT)
    }

    /// First fit, carved from the tail of the chosen free block.
    pub fn alloc(&mut self, size: u32) -> Result<u32, HeapError>
    {
        let Some(need) = Self::round_size(size)
        else
        {
            return Err(HeapError::OutOfMemory {
                requested:    size,
                largest_free: self.get_largest_free_block()
            });
        };

        let mut prev = NIL;
        let mut cur = self.words[HEAD_WORD];
        let mut largest_free = 0;

        while cur != NIL
        {
            let (block_size, next) = self.read_block(cur);

            if block_size >= need
            {
                let offset = if block_size - need >= HEAP_ALIGNMENT
                {
                    self.write_block(cur, block_size - need, next);

                    cur + block_size - need
                }
                else
                {
                    self.link(prev, next);

                    cur
                };

                self.words[USED_WORD] += need;
                self.words[LIVE_WORD] += 1;

                return Ok(offset);
            }

            largest_free = largest_free.max(block_size);
            prev = cur;
            cur = next;
        }

        Err(HeapError::OutOfMemory {
            requested: need,
            largest_free
        })
    }

    /// # Panics
    /// If the range is out of bounds, misaligned or overlaps a free block.
    pub fn free(&mut self, offset: u32, size: u32)
    {
        let size = Self::round_size(size).unwrap_or(u32::MAX);
        let total = self.words[TOTAL_WORD];

        assert!(
            offset >= Self::HEADER_BYTES
                && offset % HEAP_ALIGNMENT == 0
                && offset.checked_add(size).is_some_and(|end| end <= total),
            "Freeing invalid heap range [{offset}, +{size}) of a {total} byte heap"
        );

        let mut prev = NIL;
        let mut cur = self.words[HEAD_WORD];

        while cur != NIL && cur < offset
        {
            prev = cur;
            cur = self.read_block(cur).1;
        }

        if prev != NIL
        {
            let prev_end = prev + self.read_block(prev).0;

            assert!(
                prev_end <= offset,
                "Freeing heap range [{offset}, +{size}) overlapping free block at {prev}"
            );
        }

        if cur != NIL
        {
            assert!(
                offset + size <= cur,
                "Freeing heap range [{offset}, +{size}) overlapping free block at {cur}"
            );
        }

        assert!(
            self.words[USED_WORD] >= size && self.words[LIVE_WORD] > 0,
            "Freeing more than was ever allocated"
        );

        let (merged_size, merged_next) = if cur != NIL && offset + size == cur
        {
            let (next_size, next_next) = self.read_block(cur);

            (size + next_size, next_next)
        }
        else
        {
            (size, cur)
        };

        match prev
        {
            NIL => self.insert_block(prev, offset, merged_size, merged_next),
            prev =>
            {
                let prev_size = self.read_block(prev).0;

                if prev + prev_size == offset
                {
                    self.write_block(prev, prev_size + merged_size, merged_next);
                }
                else
                {
                    self.insert_block(prev, offset, merged_size, merged_next);
                }
            }
        }

        self.words[USED_WORD] -= size;
        self.words[LIVE_WORD] -= 1;
    }

    pub fn write(&mut self, offset: u32, data: &[u32])
    {
        let start = self.word_range_start(offset, data.len());

        self.words[start..start + data.len()].copy_from_slice(data);
    }

    pub fn read(&self, offset: u32, len_words: usize) -> &[u32]
    {
        let start = self.word_range_start(offset, len_words);

        &self.words[start..start + len_words]
    }

    pub fn get_arena_bytes(&self) -> u32
    {
        self.words[TOTAL_WORD] - Self::HEADER_BYTES
    }

    pub fn get_used_bytes(&self) -> u32
    {
        self.words[USED_WORD]
    }

    pub fn get_free_bytes(&self) -> u32
    {
        self.get_arena_bytes() - self.get_used_bytes()
    }

    pub fn get_live_allocations(&self) -> u32
    {
        self.words[LIVE_WORD]
    }

    pub fn get_largest_free_block(&self) -> u32
    {
        self.free_blocks().map(|(_, s)| s).max().unwrap_or(0)
    }

    /// `(offset, size)` of every free block in address order.
    pub fn free_blocks(&self) -> impl Iterator<Item = (u32, u32)> + '_
    {
        let mut cur = self.words[HEAD_WORD];

        std::iter::from_fn(move || {
            if cur == NIL
            {
                return None;
            }

            let (size, next) = self.read_block(cur);
            let block = (cur, size);

            cur = next;

            Some(block)
        })
    }

    fn get_total_bytes_from_len(&self) -> u32
    {
        (self.words.len() * 4) as u32
    }

    fn read_block(&self, offset: u32) -> (u32, u32)
    {
        let total = self.words[TOTAL_WORD];
        let idx = offset as usize / 4;

        assert!(
            offset >= Self::HEADER_BYTES && offset % HEAP_ALIGNMENT == 0 && offset < total,
            "Corrupt heap free list: block at {offset}"
        );

        let (size, next) = (self.words[idx], self.words[idx + 1]);

        assert!(
            size >= HEAP_ALIGNMENT && size % HEAP_ALIGNMENT == 0 && offset + size <= total,
            "Corrupt heap free list: block at {offset} has size {size}"
        );
        assert!(
            next == NIL || next > offset,
            "Corrupt heap free list: block at {offset} links back to {next}"
        );

        (size, next)
    }

    fn write_block(&mut self, offset: u32, size: u32, next: u32)
    {
        let idx = offset as usize / 4;

        self.words[idx] = size;
        self.words[idx + 1] = next;
    }

    fn insert_block(&mut self, prev: u32, offset: u32, size: u32, next: u32)
    {
        self.write_block(offset, size, next);
        self.link(prev, offset);
    }

    fn link(&mut self, prev: u32, next: u32)
    {
        match prev
        {
            NIL => self.words[HEAD_WORD] = next,
            prev => self.words[prev as usize / 4 + 1] = next
        }
    }

    fn word_range_start(&self, offset: u32, len_words: usize) -> usize
    {
        let start = offset as usize / 4;

        assert!(
            offset >= Self::HEADER_BYTES
                && offset % 4 == 0
                && start + len_words <= self.words.len(),
            "Heap access [{offset}, +{len_words} words) is out of bounds"
        );

        start
    }
}
