#[macro_use]
extern crate bencher;

use bencher::Bencher;

use plato_cmp::prelude::*;
use plato_cmp::collection::CollectionHeader;
use plato_cmp::sample::write_sample;

const SAMPLE_COUNT: u16 = 2048;

fn params(cmp_mode: CmpMode) -> CmpParams {
    CmpParams {
        cmp_mode,
        model_value: 8,
        lossy_par: 0,
        nc_imagette: 16, saturated_imagette: 16,
        s_exp_flags: 2, s_fx: 16, s_efx: 16, s_ncob: 16, s_ecob: 16, s_variance: 16,
        l_exp_flags: 2, l_fx: 16, l_efx: 16, l_ncob: 16, l_ecob: 16, l_variance: 16,
    }
}

fn sfx_chunk(sample_count: u16) -> Vec<u8> {
    let subservice = Subservice::SFx;
    let sample_len = subservice.sample_byte_len();
    let mut bytes = vec![0u8; 12 + sample_len * usize::from(sample_count)];
    {
        let mut writer = BitWriter::new(&mut bytes[..12]);
        let header = CollectionHeader {
            timestamp: 0,
            config_id: 0,
            packet_type: false,
            subservice,
            ccd_id: 0,
            sequence_number: 0,
            data_length: sample_len as u16 * sample_count,
        };
        header.write(&mut writer);
        writer.flush().unwrap();
    }
    let fields = subservice.fields();
    for i in 0..usize::from(sample_count) {
        let offset = 12 + i * sample_len;
        let values = [(i % 251) as u32, ((i * 37) % 65536) as u32];
        write_sample(&mut bytes[offset..offset + sample_len], &fields, &values);
    }
    bytes
}

fn imagette_chunk(sample_count: u16) -> Vec<u8> {
    let subservice = Subservice::Imagette;
    let mut bytes = vec![0u8; 12 + 2 * usize::from(sample_count)];
    {
        let mut writer = BitWriter::new(&mut bytes[..12]);
        let header = CollectionHeader {
            timestamp: 0,
            config_id: 0,
            packet_type: false,
            subservice,
            ccd_id: 0,
            sequence_number: 0,
            data_length: 2 * sample_count,
        };
        header.write(&mut writer);
        writer.flush().unwrap();
    }
    for i in 0..usize::from(sample_count) {
        let pixel = ((i * 97) % 4096) as u16;
        bytes[12 + i * 2..12 + i * 2 + 2].copy_from_slice(&pixel.to_ne_bytes());
    }
    bytes
}

fn compress_sfx_diff_zero(bench: &mut Bencher) {
    let chunk = sfx_chunk(SAMPLE_COUNT);
    let cmp_params = params(CmpMode::DiffZero);
    let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
    bench.iter(|| {
        let written = compress_chunk(&chunk, None, None, &mut dst, &cmp_params, 0, 0).unwrap();
        bencher::black_box(written);
    })
}

fn decompress_sfx_diff_zero(bench: &mut Bencher) {
    let chunk = sfx_chunk(SAMPLE_COUNT);
    let cmp_params = params(CmpMode::DiffZero);
    let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
    let written = compress_chunk(&chunk, None, None, &mut dst, &cmp_params, 0, 0).unwrap();
    dst.truncate(written);
    let mut decoded = vec![0u8; chunk.len()];

    bench.iter(|| {
        decompress_cmp_entity(&dst, None, None, Some(&mut decoded)).unwrap();
        bencher::black_box(&decoded);
    })
}

fn compress_imagette_diff_multi(bench: &mut Bencher) {
    let chunk = imagette_chunk(SAMPLE_COUNT);
    let cmp_params = params(CmpMode::DiffMulti);
    let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
    bench.iter(|| {
        let written = compress_chunk(&chunk, None, None, &mut dst, &cmp_params, 0, 0).unwrap();
        bencher::black_box(written);
    })
}

fn compress_sfx_model_zero(bench: &mut Bencher) {
    let chunk = sfx_chunk(SAMPLE_COUNT);
    let cmp_params = params(CmpMode::ModelZero);
    let model = vec![0u8; chunk.len()];
    let mut updated_model = model.clone();
    let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
    bench.iter(|| {
        let written = compress_chunk(&chunk, Some(&model), Some(&mut updated_model), &mut dst, &cmp_params, 0, 0).unwrap();
        bencher::black_box(written);
    })
}

fn compress_sfx_raw(bench: &mut Bencher) {
    let chunk = sfx_chunk(SAMPLE_COUNT);
    let cmp_params = params(CmpMode::Raw);
    let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
    bench.iter(|| {
        let written = compress_chunk(&chunk, None, None, &mut dst, &cmp_params, 0, 0).unwrap();
        bencher::black_box(written);
    })
}

benchmark_group!(
    roundtrip,
    compress_sfx_diff_zero,
    decompress_sfx_diff_zero,
    compress_imagette_diff_multi,
    compress_sfx_model_zero,
    compress_sfx_raw
);
benchmark_main!(roundtrip);
