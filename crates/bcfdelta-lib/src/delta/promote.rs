use crate::model::{widen_i16, widen_i8, Payload, Ragged, Record};

/// Reusable i32 storages for width promotion.
///
/// Promoted payloads travel with the record until it has been written, after
/// which [`PromotePool::reclaim_record`] takes the storages back, keeping
/// memory use bounded by the widest record seen so far.
#[derive(Default)]
pub struct PromotePool {
    vecs: Vec<Vec<i32>>,
    raggeds: Vec<Ragged<i32>>,
}

// Reclaim also harvests payloads that were i32 to begin with, so the pool is
// capped rather than tracking which storages promotion handed out.
const MAX_POOLED: usize = 32;

impl PromotePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_vec(&mut self) -> Vec<i32> {
        self.vecs.pop().unwrap_or_default()
    }

    fn take_ragged(&mut self) -> Ragged<i32> {
        self.raggeds.pop().unwrap_or_default()
    }

    /// Harvest i32 storages from a record that has been written and is about
    /// to be dropped. Must not be called on a record that is still needed.
    pub fn reclaim_record(&mut self, record: &mut Record) {
        for field in &mut record.genotypes {
            match &mut field.payload {
                Payload::Int32(v) if v.capacity() > 0 && self.vecs.len() < MAX_POOLED => {
                    let mut v = std::mem::take(v);
                    v.clear();
                    self.vecs.push(v);
                }
                Payload::Int32Vec(r) if self.raggeds.len() < MAX_POOLED => {
                    let mut r = std::mem::take(r);
                    r.clear();
                    self.raggeds.push(r);
                }
                _ => {}
            }
        }
    }
}

/// Lift a narrow integer payload to i32 so the element op cannot overflow its
/// storage. Missing sentinels are carried to the i32 sentinel; other payloads
/// are left untouched.
pub(crate) fn promote_payload(payload: &mut Payload, pool: &mut PromotePool) {
    match payload {
        Payload::Int8(v) => {
            let mut wide = pool.take_vec();
            wide.clear();
            wide.extend(v.iter().map(|&x| widen_i8(x)));
            *payload = Payload::Int32(wide);
        }
        Payload::Int16(v) => {
            let mut wide = pool.take_vec();
            wide.clear();
            wide.extend(v.iter().map(|&x| widen_i16(x)));
            *payload = Payload::Int32(wide);
        }
        Payload::Int8Vec(r) => {
            let mut wide = pool.take_ragged();
            wide.clear();
            for row in r.iter() {
                wide.push_row_iter(row.iter().map(|&x| widen_i8(x)));
            }
            *payload = Payload::Int32Vec(wide);
        }
        Payload::Int16Vec(r) => {
            let mut wide = pool.take_ragged();
            wide.clear();
            for row in r.iter() {
                wide.push_row_iter(row.iter().map(|&x| widen_i16(x)));
            }
            *payload = Payload::Int32Vec(wide);
        }
        _ => {}
    }
}
