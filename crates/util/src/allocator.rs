/// Hands out dense slot indices in `[0, total_slots)`, lowest first. Slots
/// are only reclaimed by dropping the whole allocator.
#[derive(Debug, Clone)]
pub struct SlotAllocator
{
    total_slots:    u32,
    next_free_slot: u32
}

impl SlotAllocator
{
    pub fn new(total_slots: u32) -> Self
    {
        SlotAllocator {
            total_slots,
            next_free_slot: 0
        }
    }

    /// (used slots, total slots)
    pub fn peek(&self) -> (u32, u32)
    {
        (self.next_free_slot, self.total_slots)
    }

    pub fn allocate(&mut self) -> Result<u32, OutOfSlots>
    {
        if self.next_free_slot >= self.total_slots
        {
            Err(OutOfSlots)
        }
        else
        {
            let slot = self.next_free_slot;

            self.next_free_slot += 1;

            Ok(slot)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutOfSlots;

impl std::fmt::Display for OutOfSlots
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "no free slots left")
    }
}

impl std::error::Error for OutOfSlots {}
