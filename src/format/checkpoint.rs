// `.lahc`/`.dlas` checkpoint format: a flat binary record of the
// acceptance policy's history ring buffer. Field order and shapes are
// ported directly from `original_source/src/optimization/LAHC.cpp`'s
// and `DLAS.cpp`'s `SaveState`/`LoadState`:
//
//   no_elements: u64   (history length L)
//   index:       u64   (ring cursor)
//   cost_max:    f64   (unused by LAHC, round-tripped anyway)
//   n:           i32   (DLAS multiplicity; reused as history_length by LAHC)
//   current_cost: f64
//   history[no_elements]: f64

use std::io::{Read, Write};

use crate::error::ProtocolError;
use crate::optimization::acceptance::{AcceptancePolicy, Dlas, Lahc};

fn write_record<W: Write>(
    w: &mut W,
    no_elements: u64,
    index: u64,
    cost_max: f64,
    n: i32,
    current_cost: f64,
    history: &[f64],
) -> Result<(), ProtocolError> {
    w.write_all(&no_elements.to_le_bytes())?;
    w.write_all(&index.to_le_bytes())?;
    w.write_all(&cost_max.to_le_bytes())?;
    w.write_all(&n.to_le_bytes())?;
    w.write_all(&current_cost.to_le_bytes())?;
    for &h in history {
        w.write_all(&h.to_le_bytes())?;
    }
    Ok(())
}

struct RawRecord {
    no_elements: u64,
    index: u64,
    cost_max: f64,
    n: i32,
    current_cost: f64,
    history: Vec<f64>,
}

fn read_record<R: Read>(r: &mut R) -> Result<RawRecord, ProtocolError> {
    let mut u64_buf = [0u8; 8];
    let mut i32_buf = [0u8; 4];
    let mut f64_buf = [0u8; 8];

    r.read_exact(&mut u64_buf)?;
    let no_elements = u64::from_le_bytes(u64_buf);
    r.read_exact(&mut u64_buf)?;
    let index = u64::from_le_bytes(u64_buf);
    r.read_exact(&mut f64_buf)?;
    let cost_max = f64::from_le_bytes(f64_buf);
    r.read_exact(&mut i32_buf)?;
    let n = i32::from_le_bytes(i32_buf);
    r.read_exact(&mut f64_buf)?;
    let current_cost = f64::from_le_bytes(f64_buf);

    let mut history = Vec::with_capacity(no_elements as usize);
    for _ in 0..no_elements {
        r.read_exact(&mut f64_buf)?;
        history.push(f64::from_le_bytes(f64_buf));
    }

    Ok(RawRecord { no_elements, index, cost_max, n, current_cost, history })
}

/// Serialize a LAHC checkpoint. `cost_max` has no meaning for LAHC but
/// is written as `f64::INFINITY` to keep the file shape identical to DLAS.
pub fn write_lahc<W: Write>(w: &mut W, lahc: &Lahc) -> Result<(), ProtocolError> {
    let history = lahc.history();
    write_record(
        w,
        history.len() as u64,
        lahc.index() as u64,
        f64::INFINITY,
        history.len() as i32,
        lahc.current_cost(),
        history,
    )
}

pub fn read_lahc<R: Read>(r: &mut R) -> Result<Lahc, ProtocolError> {
    let record = read_record(r)?;
    if record.history.len() as u64 != record.no_elements {
        return Err(ProtocolError::Corrupt {
            what: "lahc checkpoint",
            detail: format!("expected {} history values, read {}", record.no_elements, record.history.len()),
        });
    }
    Ok(Lahc::from_checkpoint(record.index as usize, record.current_cost, record.history))
}

/// Serialize a DLAS checkpoint.
pub fn write_dlas<W: Write>(w: &mut W, dlas: &Dlas) -> Result<(), ProtocolError> {
    let history = dlas.history();
    write_record(
        w,
        history.len() as u64,
        dlas.index() as u64,
        dlas.cost_max(),
        dlas.multiplicity() as i32,
        dlas.current_cost(),
        history,
    )
}

pub fn read_dlas<R: Read>(r: &mut R) -> Result<Dlas, ProtocolError> {
    let record = read_record(r)?;
    if record.history.len() as u64 != record.no_elements {
        return Err(ProtocolError::Corrupt {
            what: "dlas checkpoint",
            detail: format!("expected {} history values, read {}", record.no_elements, record.history.len()),
        });
    }
    if record.n < 0 {
        return Err(ProtocolError::Corrupt { what: "dlas checkpoint", detail: "negative multiplicity".to_string() });
    }
    Ok(Dlas::from_checkpoint(
        record.index as usize,
        record.cost_max,
        record.n as usize,
        record.current_cost,
        record.history,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::acceptance::AcceptancePolicy;
    use std::io::Cursor;

    #[test]
    fn lahc_round_trips_history_index_and_current_cost() {
        let mut lahc = Lahc::new(4);
        lahc.on_initial_score(100.0);
        lahc.accept(90.0);
        lahc.post_iteration();
        lahc.accept(95.0);
        lahc.post_iteration();

        let mut buf = Vec::new();
        write_lahc(&mut buf, &lahc).expect("write");
        let restored = read_lahc(&mut Cursor::new(buf)).expect("read");

        assert_eq!(restored.history(), lahc.history());
        assert_eq!(restored.index(), lahc.index());
        assert_eq!(restored.current_cost(), lahc.current_cost());
    }

    #[test]
    fn dlas_round_trips_cost_max_and_multiplicity() {
        let mut dlas = Dlas::new(3);
        dlas.on_initial_score(200.0);
        dlas.accept(150.0);
        dlas.post_iteration();

        let mut buf = Vec::new();
        write_dlas(&mut buf, &dlas).expect("write");
        let restored = read_dlas(&mut Cursor::new(buf)).expect("read");

        assert_eq!(restored.history(), dlas.history());
        assert_eq!(restored.index(), dlas.index());
        assert_eq!(restored.cost_max(), dlas.cost_max());
        assert_eq!(restored.multiplicity(), dlas.multiplicity());
        assert_eq!(restored.current_cost(), dlas.current_cost());
    }

    #[test]
    fn truncated_file_is_corrupt_not_panic() {
        let bytes = 3u64.to_le_bytes().to_vec();
        let err = read_lahc(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
