//! Frame slot lifecycle tests: allocation, release, flush, admission.

use std::sync::Arc;

use decvue_core::{CoreError, PictureAllocator, PictureBuffer, PictureGeometry, SystemAllocator};
use decvue_hevc::{
    ChromaFormat, DecoderContext, DpbError, FrameFlags, NalUnitType, Pps, ShortTermRps,
    SliceHeader, SliceType, Sps,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_sps() -> Sps {
    Sps {
        pic_width_in_luma_samples: 128,
        pic_height_in_luma_samples: 64,
        chroma_format_idc: ChromaFormat::Chroma420,
        bit_depth_luma_minus8: 0,
        log2_max_pic_order_cnt_lsb_minus4: 4,
        log2_min_luma_coding_block_size_minus3: 0,
        log2_diff_max_min_luma_coding_block_size: 3,
        conf_win_left_offset: 0,
        conf_win_right_offset: 0,
        conf_win_top_offset: 0,
        conf_win_bottom_offset: 0,
        sps_max_dec_pic_buffering_minus1: vec![63],
        sps_max_num_reorder_pics: vec![63],
        sps_temporal_mvp_enabled_flag: true,
    }
}

fn create_context() -> DecoderContext {
    let sps = Arc::new(create_test_sps());
    let pps = Arc::new(Pps::new(&sps));
    DecoderContext::new(sps, pps, Box::new(SystemAllocator))
}

fn idr_slice() -> SliceHeader {
    SliceHeader {
        slice_type: SliceType::I,
        ..Default::default()
    }
}

/// A non-IDR slice carrying an explicit short-term RPS.
fn trail_slice(poc_lsb: u32, deltas: &[i32], num_negative: usize, used: u32) -> SliceHeader {
    SliceHeader {
        slice_type: SliceType::I,
        slice_pic_order_cnt_lsb: poc_lsb,
        short_term_rps: Some(ShortTermRps {
            delta_poc: deltas.to_vec(),
            num_negative_pics: num_negative,
            used,
        }),
        ..Default::default()
    }
}

fn nb_occupied(ctx: &DecoderContext) -> usize {
    ctx.layer(0).expect("layer 0").nb_occupied()
}

struct FailingAllocator;

impl PictureAllocator for FailingAllocator {
    fn get_buffer(&self, _geometry: PictureGeometry) -> decvue_core::Result<PictureBuffer> {
        Err(CoreError::alloc("simulated allocation failure"))
    }
}

// ============================================================================
// Admission
// ============================================================================

#[test]
fn test_admission_sets_initial_flags() {
    let mut ctx = create_context();
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("IDR admits");

    let cur = ctx.cur_frame().expect("current picture admitted");
    let slot = &ctx.layer(0).expect("layer 0").dpb()[cur];
    assert_eq!(slot.poc(), 0);
    assert!(slot
        .flags()
        .contains(FrameFlags::OUTPUT | FrameFlags::SHORT_REF));
    assert!(slot.buffer().is_some());
    assert_eq!(
        slot.buffer().expect("occupied").crop,
        ctx.layer(0).expect("layer 0").sps().output_window()
    );
}

#[test]
fn test_pic_output_flag_clear_skips_output() {
    let mut ctx = create_context();
    let mut sh = idr_slice();
    sh.pic_output_flag = false;
    ctx.decode_slice(&sh, NalUnitType::IdrWRadl).expect("IDR admits");

    let cur = ctx.cur_frame().expect("current picture admitted");
    let slot = &ctx.layer(0).expect("layer 0").dpb()[cur];
    assert_eq!(slot.flags(), FrameFlags::SHORT_REF);
}

#[test]
fn test_duplicate_poc_rejected() {
    let mut ctx = create_context();
    ctx.decode_slice(&trail_slice(5, &[], 0, 0), NalUnitType::TrailR)
        .expect("first POC 5 admits");
    assert_eq!(nb_occupied(&ctx), 1);

    let err = ctx
        .decode_slice(&trail_slice(5, &[], 0, 0), NalUnitType::TrailR)
        .expect_err("second POC 5 must be rejected");
    assert!(matches!(err, DpbError::InvalidData(_)));
    assert_eq!(nb_occupied(&ctx), 1);
}

#[test]
fn test_dpb_full() {
    let mut ctx = create_context();
    // Reorder bounds are far above the slot count, so nothing is ever
    // evicted and the 33rd admission finds no free slot.
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("IDR admits");
    for poc in 1..32 {
        ctx.decode_slice(&trail_slice(poc, &[], 0, 0), NalUnitType::TrailR)
            .unwrap_or_else(|err| panic!("POC {poc} should fit: {err}"));
    }
    assert_eq!(nb_occupied(&ctx), 32);

    let err = ctx
        .decode_slice(&trail_slice(32, &[], 0, 0), NalUnitType::TrailR)
        .expect_err("33rd picture overflows the DPB");
    assert!(matches!(err, DpbError::DpbFull));
}

#[test]
fn test_allocation_failure_leaves_no_partial_slot() {
    let sps = Arc::new(create_test_sps());
    let pps = Arc::new(Pps::new(&sps));
    let mut ctx = DecoderContext::new(sps, pps, Box::new(FailingAllocator));

    let err = ctx
        .decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect_err("allocator always fails");
    assert!(matches!(err, DpbError::Oom(_)));
    assert_eq!(nb_occupied(&ctx), 0);
    assert!(ctx
        .layer(0)
        .expect("layer 0")
        .dpb()
        .iter()
        .all(|slot| slot.is_free()));
    assert!(ctx.cur_frame().is_none());
}

// ============================================================================
// Release paths
// ============================================================================

#[test]
fn test_unref_with_empty_mask_is_noop() {
    let mut ctx = create_context();
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("IDR admits");
    let cur = ctx.cur_frame().expect("current picture admitted");

    let before = ctx.layer(0).expect("layer 0").dpb()[cur].flags();
    ctx.unref_frame(0, cur, FrameFlags::empty())
        .expect("layer exists");
    let slot = &ctx.layer(0).expect("layer 0").dpb()[cur];
    assert_eq!(slot.flags(), before);
    assert!(slot.occupied());
}

#[test]
fn test_clear_refs_keeps_output_pending_pictures() {
    let mut ctx = create_context();
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("IDR admits");
    let cur = ctx.cur_frame().expect("current picture admitted");

    ctx.clear_refs(0).expect("layer exists");
    let slot = &ctx.layer(0).expect("layer 0").dpb()[cur];
    assert_eq!(slot.flags(), FrameFlags::OUTPUT);
    assert!(slot.occupied());

    // Clearing OUTPUT as well releases the slot entirely.
    ctx.unref_frame(0, cur, FrameFlags::ALL).expect("layer exists");
    assert!(ctx.layer(0).expect("layer 0").dpb()[cur].is_free());
}

#[test]
fn test_flush_dpb_is_idempotent() {
    let mut ctx = create_context();
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("IDR admits");
    ctx.decode_slice(&trail_slice(1, &[-1], 1, 0b1), NalUnitType::TrailR)
        .expect("POC 1 admits");
    assert!(nb_occupied(&ctx) > 0);

    ctx.flush_dpb();
    assert_eq!(nb_occupied(&ctx), 0);
    assert!(ctx
        .layer(0)
        .expect("layer 0")
        .dpb()
        .iter()
        .all(|slot| slot.is_free()));

    // A second flush observes exactly the same state.
    ctx.flush_dpb();
    assert_eq!(nb_occupied(&ctx), 0);
}

// ============================================================================
// Multi-layer
// ============================================================================

#[test]
fn test_layers_have_independent_dpbs() {
    let mut ctx = create_context();
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("layer 0 IDR admits");

    let sps = Arc::new(create_test_sps());
    let pps = Arc::new(Pps::new(&sps));
    let layer1 = ctx.add_layer(sps, pps);
    ctx.select_layer(layer1).expect("layer exists");

    // The same POC is no duplicate in another layer.
    ctx.decode_slice(&idr_slice(), NalUnitType::IdrWRadl)
        .expect("layer 1 IDR admits");
    assert_eq!(ctx.layer(0).expect("layer 0").nb_occupied(), 1);
    assert_eq!(ctx.layer(1).expect("layer 1").nb_occupied(), 1);
}

#[test]
fn test_select_missing_layer_fails() {
    let mut ctx = create_context();
    assert!(ctx.select_layer(3).is_err());
}
