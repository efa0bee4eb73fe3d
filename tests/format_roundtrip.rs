// Integration tests for the external file formats: `.rp`/`.rp.ini`
// text programs and `.lahc`/`.dlas` binary checkpoints.

use rasta_opt::format::{self, RpHeader};
use rasta_opt::optimization::{AcceptancePolicy, Dlas, Lahc};
use rasta_opt::{Instruction, Op, Picture, TargetRegister};
use std::io::Cursor;

#[test]
fn rp_program_round_trips_through_a_full_picture() {
    let mut picture = Picture::new(4);
    picture.lines[0].set_instructions(vec![
        Instruction::new(Op::Lda, None, 0x0E),
        Instruction::new(Op::Sta, Some(TargetRegister::ColBak), 0),
        Instruction::new(Op::Ldy, None, 0x02),
        Instruction::new(Op::Sty, Some(TargetRegister::Color0), 0),
    ]);
    picture.lines[2].set_instructions(vec![Instruction::new(Op::Ldx, None, 0x7F)]);

    let header = RpHeader {
        evaluations: Some(1_234),
        input_name: Some("target.png".to_string()),
        cmd_line: Some("rasta-opt --threads 4".to_string()),
        seed: Some(99),
    };

    let text = format::write_rp(&picture, &header);
    let (parsed, parsed_header) = format::parse_rp(&text, 4).expect("parse");

    assert_eq!(parsed_header.evaluations, Some(1_234));
    assert_eq!(parsed_header.input_name.as_deref(), Some("target.png"));
    assert_eq!(parsed_header.seed, Some(99));
    assert_eq!(parsed.lines[0].instructions().len(), picture.lines[0].instructions().len());
    assert_eq!(parsed.lines[2].instructions()[0].value(), 0x7F);
    assert!(parsed.lines[1].instructions().is_empty());
    assert!(parsed.lines[3].instructions().is_empty());
}

#[test]
fn lahc_checkpoint_survives_a_write_read_cycle_via_a_file() {
    let dir = std::env::temp_dir().join(format!("rasta-opt-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("checkpoint.lahc");

    let mut lahc = Lahc::new(8);
    lahc.on_initial_score(500.0);
    for cost in [480.0, 470.0, 475.0, 460.0] {
        lahc.accept(cost);
        lahc.post_iteration();
    }

    let mut file = std::fs::File::create(&path).unwrap();
    format::write_lahc(&mut file, &lahc).unwrap();
    drop(file);

    let bytes = std::fs::read(&path).unwrap();
    let restored = format::read_lahc(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(restored.history(), lahc.history());
    assert_eq!(restored.current_cost(), lahc.current_cost());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn dlas_checkpoint_preserves_cost_max_and_multiplicity() {
    let mut dlas = Dlas::new(5);
    dlas.on_initial_score(1_000.0);
    for cost in [990.0, 1_005.0, 980.0] {
        dlas.accept(cost);
        dlas.post_iteration();
    }

    let mut buf = Vec::new();
    format::write_dlas(&mut buf, &dlas).unwrap();
    let restored = format::read_dlas(&mut Cursor::new(buf)).unwrap();

    assert_eq!(restored.cost_max(), dlas.cost_max());
    assert_eq!(restored.multiplicity(), dlas.multiplicity());
    assert_eq!(restored.history(), dlas.history());
}
