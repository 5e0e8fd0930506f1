//! 会话表: 由代数校验句柄寻址的定长会话槽.
//!
//! 句柄低 16 位为槽位索引, 高 16 位为代数. 槽位被释放后代数加一,
//! 旧句柄随即失效.

use std::fmt;

use vigil_core::{VigilError, VigilResult};

/// 会话句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u32);

impl SessionHandle {
    fn new(index: u16, generation: u16) -> Self {
        Self(u32::from(generation) << 16 | u32::from(index))
    }

    /// 从原始值恢复
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// 原始值
    pub fn raw(self) -> u32 {
        self.0
    }

    /// 槽位索引
    pub fn index(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    /// 代数
    pub fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index(), self.generation())
    }
}

enum SlotState<T> {
    Vacant,
    Occupied(Box<T>),
    /// 已借出给调用方单独驱动
    Lent,
}

struct Slot<T> {
    generation: u16,
    state: SlotState<T>,
}

/// 定长会话表
pub struct SessionTable<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    live: usize,
}

impl<T> SessionTable<T> {
    /// 创建容量为 `capacity` 的会话表 (不超过 65535)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity: capacity.min(usize::from(u16::MAX)),
            live: 0,
        }
    }

    /// 占用一个空槽, `make` 接收分配到的句柄并构造值
    pub fn insert_with(&mut self, make: impl FnOnce(SessionHandle) -> T) -> VigilResult<SessionHandle> {
        let index = match self
            .slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Vacant))
        {
            Some(i) => i,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Vacant,
                });
                self.slots.len() - 1
            }
            None => return Err(VigilError::SessionTableFull(self.capacity)),
        };

        let slot = &mut self.slots[index];
        let handle = SessionHandle::new(index as u16, slot.generation);
        slot.state = SlotState::Occupied(Box::new(make(handle)));
        self.live += 1;
        Ok(handle)
    }

    fn slot_mut(&mut self, handle: SessionHandle) -> VigilResult<&mut Slot<T>> {
        match self.slots.get_mut(handle.index()) {
            Some(slot) if slot.generation == handle.generation() => Ok(slot),
            _ => Err(VigilError::SessionNotFound(handle.raw())),
        }
    }

    /// 按句柄访问
    pub fn get(&self, handle: SessionHandle) -> VigilResult<&T> {
        match self.slots.get(handle.index()) {
            Some(Slot {
                generation,
                state: SlotState::Occupied(value),
            }) if *generation == handle.generation() => Ok(value),
            _ => Err(VigilError::SessionNotFound(handle.raw())),
        }
    }

    /// 按句柄可变访问
    pub fn get_mut(&mut self, handle: SessionHandle) -> VigilResult<&mut T> {
        match &mut self.slot_mut(handle)?.state {
            SlotState::Occupied(value) => Ok(value),
            _ => Err(VigilError::SessionNotFound(handle.raw())),
        }
    }

    /// 移除并返回值, 槽位代数加一
    pub fn remove(&mut self, handle: SessionHandle) -> VigilResult<T> {
        let slot = self.slot_mut(handle)?;
        match std::mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Occupied(value) => {
                slot.generation = slot.generation.wrapping_add(1);
                self.live -= 1;
                Ok(*value)
            }
            other => {
                slot.state = other;
                Err(VigilError::SessionNotFound(handle.raw()))
            }
        }
    }

    /// 借出值, 槽位保留到 [`SessionTable::restore`] 归还
    pub fn take(&mut self, handle: SessionHandle) -> VigilResult<T> {
        let slot = self.slot_mut(handle)?;
        match std::mem::replace(&mut slot.state, SlotState::Lent) {
            SlotState::Occupied(value) => Ok(*value),
            other => {
                slot.state = other;
                Err(VigilError::SessionNotFound(handle.raw()))
            }
        }
    }

    /// 归还借出的值
    pub fn restore(&mut self, handle: SessionHandle, value: T) -> VigilResult<()> {
        let slot = self.slot_mut(handle)?;
        if !matches!(slot.state, SlotState::Lent) {
            return Err(VigilError::InvalidArgument(format!(
                "句柄 {} 没有被借出",
                handle
            )));
        }
        slot.state = SlotState::Occupied(Box::new(value));
        Ok(())
    }

    /// 放弃借出的槽位 (借出方已自行销毁值)
    pub fn release(&mut self, handle: SessionHandle) -> VigilResult<()> {
        let slot = self.slot_mut(handle)?;
        if !matches!(slot.state, SlotState::Lent) {
            return Err(VigilError::InvalidArgument(format!(
                "句柄 {} 没有被借出",
                handle
            )));
        }
        slot.state = SlotState::Vacant;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Ok(())
    }

    /// 在用槽位数 (含借出)
    pub fn len(&self) -> usize {
        self.live
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前驻留在表中的句柄
    pub fn handles(&self) -> impl Iterator<Item = SessionHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s.state {
            SlotState::Occupied(_) => Some(SessionHandle::new(i as u16, s.generation)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut table = SessionTable::new(4);
        let h = table.insert_with(|h| h.raw()).unwrap();
        assert_eq!(h.index(), 0);
        assert_eq!(*table.get(h).unwrap(), h.raw(), "构造函数应收到分配的句柄");
        *table.get_mut(h).unwrap() += 1;
        assert_eq!(*table.get(h).unwrap(), h.raw() + 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut table = SessionTable::new(2);
        let h1 = table.insert_with(|_| "a").unwrap();
        assert_eq!(table.remove(h1).unwrap(), "a");
        let h2 = table.insert_with(|_| "b").unwrap();
        assert_eq!(h1.index(), h2.index(), "空槽应被复用");
        assert_ne!(h1, h2, "复用槽位的句柄代数不同");
        assert!(matches!(table.get(h1), Err(VigilError::SessionNotFound(_))));
        assert!(table.remove(h1).is_err());
        assert_eq!(*table.get(h2).unwrap(), "b");
    }

    #[test]
    fn test_capacity_limit() {
        let mut table = SessionTable::new(2);
        table.insert_with(|_| 1).unwrap();
        table.insert_with(|_| 2).unwrap();
        assert!(matches!(
            table.insert_with(|_| 3),
            Err(VigilError::SessionTableFull(2))
        ));
    }

    #[test]
    fn test_take_and_restore() {
        let mut table = SessionTable::new(2);
        let h = table.insert_with(|_| String::from("s")).unwrap();
        let value = table.take(h).unwrap();
        assert!(table.get(h).is_err(), "借出期间不可访问");
        assert!(table.take(h).is_err());
        assert_eq!(table.len(), 1, "借出的槽位仍计入");
        assert_eq!(table.handles().count(), 0);
        table.restore(h, value).unwrap();
        assert_eq!(table.get(h).unwrap(), "s");
        assert!(table.restore(h, String::new()).is_err(), "未借出时不能归还");

        let _ = table.take(h).unwrap();
        table.release(h).unwrap();
        assert!(table.is_empty());
        assert!(table.get(h).is_err());
    }
}
