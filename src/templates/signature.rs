use image::RgbaImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Box sizes are bucketed so one-pixel detector jitter keeps the same signature.
const SIZE_BUCKET_PX: u32 = 4;

pub fn compute_phash(image: &RgbaImage) -> String {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(image);
    hash.to_base64()
}

/// Structural signature of a cropped region: bucketed size plus pHash.
pub fn compute_signature(crop: &RgbaImage) -> String {
    format!(
        "{}x{}:{}",
        crop.width() / SIZE_BUCKET_PX,
        crop.height() / SIZE_BUCKET_PX,
        compute_phash(crop)
    )
}

pub fn compute_hamming_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}
