// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Preprocessing tests: the tensor handed to the classifier must match the
//! ResNet50 input contract regardless of the upload's size or color mode.

use super::common::*;
use fabstir_image_classifier::vision::preprocessing::CAFFE_MEAN_BGR;
use fabstir_image_classifier::vision::{
    decode_image_bytes, Normalization, PreprocessConfig, Preprocessor, TensorLayout,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

fn resnet_preprocessor(layout: TensorLayout, normalization: Normalization) -> Preprocessor {
    Preprocessor::new(PreprocessConfig {
        input_size: 224,
        layout,
        normalization,
    })
    .unwrap()
}

#[test]
fn test_any_size_becomes_224_square() {
    let preprocessor = resnet_preprocessor(TensorLayout::Nhwc, Normalization::Caffe);

    for (w, h) in [(1, 1), (640, 480), (50, 900)] {
        let decoded = decode_image_bytes(&png_bytes(w, h)).unwrap();
        let input = preprocessor.preprocess(&decoded).unwrap();
        assert_eq!(input.shape(), &[1, 224, 224, 3], "from {}x{}", w, h);
    }
}

#[test]
fn test_caffe_encoding_is_bgr_mean_subtracted() {
    let preprocessor = resnet_preprocessor(TensorLayout::Nhwc, Normalization::Caffe);
    let bytes = encode(&solid_rgb(64, 64, [200, 100, 50]), ImageFormat::Png);
    let input = preprocessor
        .preprocess(&decode_image_bytes(&bytes).unwrap())
        .unwrap();

    // Channel 0 is blue, channel 2 is red
    let expected = [
        50.0 - CAFFE_MEAN_BGR[0],
        100.0 - CAFFE_MEAN_BGR[1],
        200.0 - CAFFE_MEAN_BGR[2],
    ];
    for (y, x) in [(0, 0), (111, 57), (223, 223)] {
        for (c, want) in expected.iter().enumerate() {
            let got = input.value_at(y, x, c);
            assert!((got - want).abs() < 1e-3, "({},{},{}) {} vs {}", y, x, c, got, want);
        }
    }
}

#[test]
fn test_grayscale_is_replicated_to_three_channels() {
    let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 30, Luma([120])));
    let decoded = decode_image_bytes(&encode(&gray, ImageFormat::Png)).unwrap();
    let input = resnet_preprocessor(TensorLayout::Nhwc, Normalization::Caffe)
        .preprocess(&decoded)
        .unwrap();

    assert_eq!(input.channels(), 3);
    for c in 0..3 {
        let want = 120.0 - CAFFE_MEAN_BGR[c];
        assert!((input.value_at(10, 10, c) - want).abs() < 1e-3);
    }
}

#[test]
fn test_nchw_layout_holds_same_values() {
    let decoded = decode_image_bytes(&png_bytes(40, 40)).unwrap();
    let nhwc = resnet_preprocessor(TensorLayout::Nhwc, Normalization::Imagenet)
        .preprocess(&decoded)
        .unwrap();
    let nchw = resnet_preprocessor(TensorLayout::Nchw, Normalization::Imagenet)
        .preprocess(&decoded)
        .unwrap();

    assert_eq!(nchw.shape(), &[1, 3, 224, 224]);
    for c in 0..3 {
        assert_eq!(nhwc.value_at(5, 7, c), nchw.value_at(5, 7, c));
    }
}

#[test]
fn test_values_stay_in_normalization_range() {
    let decoded = decode_image_bytes(&png_bytes(17, 23)).unwrap();
    for normalization in [Normalization::Caffe, Normalization::Imagenet] {
        let (lo, hi) = normalization.value_range();
        let input = resnet_preprocessor(TensorLayout::Nhwc, normalization)
            .preprocess(&decoded)
            .unwrap();
        assert!(input.view().iter().all(|v| *v >= lo && *v <= hi));
    }
}
