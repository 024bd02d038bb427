use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use std::collections::HashMap;
use std::path::Path;

/// Sequences at least this long get the "popular element" heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Similarity of two normalized OCR strings in [0, 1].
///
/// Both empty is a perfect match, exactly one empty is no match. Otherwise
/// this is the matching-blocks ratio `2 * M / T`, where `M` is the number
/// of characters in the longest common blocks and `T` the combined length.
/// The pair is put in a canonical order first so the score is symmetric.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    if a == b {
        return 1.0;
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let first: Vec<char> = first.chars().collect();
    let second: Vec<char> = second.chars().collect();
    SequenceMatcher::new(&first, &second).ratio()
}

/// Longest-matching-blocks alignment of two character sequences.
struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        // very frequent characters in long sequences never seed a match
        if b.len() >= AUTOJUNK_MIN_LEN {
            let ntest = b.len() / 100 + 1;
            b2j.retain(|_, indices| indices.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (a, b) = (self.a, self.b);
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);

        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(indices) = self.b2j.get(&a[i]) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = next;
        }

        // popular characters were skipped above; grow the block over them
        while besti > alo && bestj > blo && a[besti - 1] == b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && a[besti + bestsize] == b[bestj + bestsize]
        {
            bestsize += 1;
        }

        (besti, bestj, bestsize)
    }

    /// Total size of all matching blocks.
    fn matched_len(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    fn ratio(&self) -> f64 {
        let len = self.a.len() + self.b.len();
        if len == 0 {
            return 1.0;
        }
        2.0 * self.matched_len() as f64 / len as f64
    }
}

/// Grayscale image downsampled to a fixed square and flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    values: Vec<f64>,
}

impl PixelGrid {
    pub fn from_image(img: &DynamicImage, size: u32) -> Self {
        let gray = to_gray(img);
        let small = imageops::resize(&gray, size, size, FilterType::CatmullRom);
        Self {
            values: small.pixels().map(|p| p.0[0] as f64).collect(),
        }
    }

    pub fn open(path: &Path, size: u32) -> Result<Self, image::ImageError> {
        let img = image::open(path)?;
        Ok(Self::from_image(&img, size))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn is_flat(&self) -> bool {
        match self.values.first() {
            Some(first) => self.values.iter().all(|v| v == first),
            None => true,
        }
    }
}

/// ITU-R 601 luma in per-mille weights, rounded half up.
///
/// `to_luma8` uses the sRGB (709) weights instead.
pub fn luma_601([r, g, b]: [u8; 3]) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

fn to_gray(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([luma_601(rgb.get_pixel(x, y).0)])
    })
}

/// Pearson correlation of two grids rescaled from [-1, 1] to [0, 1].
///
/// A flat grid has no variance, so correlation is undefined; the pair then
/// scores 1.0 when the raw values are numerically close and 0.0 otherwise.
pub fn pixel_similarity(a: &PixelGrid, b: &PixelGrid) -> f64 {
    if a.values.len() != b.values.len() || a.values.is_empty() {
        return 0.0;
    }
    if a.values == b.values {
        return 1.0;
    }
    if a.is_flat() || b.is_flat() {
        return if all_close(&a.values, &b.values) { 1.0 } else { 0.0 };
    }

    let n = a.values.len() as f64;
    let mean_a = a.values.iter().sum::<f64>() / n;
    let mean_b = b.values.iter().sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.values.iter().zip(&b.values) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let corr = cov / (var_a * var_b).sqrt();
    ((corr + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn all_close(a: &[f64], b: &[f64]) -> bool {
    const RTOL: f64 = 1e-5;
    const ATOL: f64 = 1e-8;
    a.iter()
        .zip(b)
        .all(|(x, y)| (x - y).abs() <= ATOL + RTOL * y.abs())
}

/// Visual closeness of two image files in [0, 1].
pub trait VisualComparator {
    fn similarity(&self, a: &Path, b: &Path) -> f64;
}

/// Decodes both files on every call and compares their [`PixelGrid`]s.
#[derive(Debug, Clone)]
pub struct DownsampledCorrelation {
    size: u32,
}

impl DownsampledCorrelation {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl VisualComparator for DownsampledCorrelation {
    fn similarity(&self, a: &Path, b: &Path) -> f64 {
        let grids = PixelGrid::open(a, self.size).and_then(|ga| {
            let gb = PixelGrid::open(b, self.size)?;
            Ok((ga, gb))
        });
        match grids {
            Ok((ga, gb)) => pixel_similarity(&ga, &gb),
            Err(e) => {
                log::error!(
                    "Error comparing images {} and {}: {}",
                    a.display(),
                    b.display(),
                    e
                );
                0.0
            }
        }
    }
}
