//! GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Georeferencing comes from ModelTransformationTag when present, otherwise
//! from ModelPixelScaleTag + ModelTiepointTag. GeoAsciiParamsTag is carried
//! through as the opaque projection string. No GeoKey interpretation is done.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use obia_core::{GeoTransform, Image, RasterGeometry, SegmentMap};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray16;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::error::{IoError, IoResult};

/// GeoKeyDirectory header with no keys (version 1.1.0).
const EMPTY_GEOKEY_DIRECTORY: [u16; 4] = [1, 1, 0, 0];

fn open(path: &Path) -> IoResult<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?)
}

/// `None` when the tag is absent. A tag that is present but does not
/// decode as numbers is an error.
fn tag_f64s(decoder: &mut Decoder<BufReader<File>>, tag: Tag) -> IoResult<Option<Vec<f64>>> {
    Ok(decoder.find_tag(tag)?.map(|v| v.into_f64_vec()).transpose()?)
}

fn read_geometry(
    decoder: &mut Decoder<BufReader<File>>,
    rows: usize,
    cols: usize,
) -> IoResult<RasterGeometry> {
    let transform = if let Some(m) =
        tag_f64s(decoder, Tag::ModelTransformationTag)?.filter(|m| m.len() >= 16)
    {
        GeoTransform::new([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        match (
            tag_f64s(decoder, Tag::ModelPixelScaleTag)?.filter(|s| s.len() >= 2),
            tag_f64s(decoder, Tag::ModelTiepointTag)?.filter(|t| t.len() >= 6),
        ) {
            (Some(s), Some(t)) => GeoTransform::from_tiepoint((s[0], s[1]), (t[0], t[1], t[3], t[4])),
            _ => {
                warn!("no georeferencing tags; using pixel coordinates");
                GeoTransform::identity()
            }
        }
    };

    let projection = decoder
        .find_tag(Tag::GeoAsciiParamsTag)?
        .map(|v| v.into_string())
        .transpose()?
        .map(|s| s.trim_end_matches(['|', '\0']).to_string())
        .unwrap_or_default();

    Ok(RasterGeometry::new(rows, cols, transform, projection))
}

fn samples_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

fn integers_to_u32<T: Copy + TryInto<u32>>(values: Vec<T>) -> IoResult<Vec<u32>> {
    values
        .into_iter()
        .map(|v| {
            v.try_into()
                .map_err(|_| IoError::InvalidData("label value outside the u32 range".into()))
        })
        .collect()
}

fn samples_to_labels(result: DecodingResult) -> IoResult<Vec<u32>> {
    match result {
        DecodingResult::U8(v) => integers_to_u32(v),
        DecodingResult::U16(v) => integers_to_u32(v),
        DecodingResult::U32(v) => Ok(v),
        DecodingResult::U64(v) => integers_to_u32(v),
        DecodingResult::I8(v) => integers_to_u32(v),
        DecodingResult::I16(v) => integers_to_u32(v),
        DecodingResult::I32(v) => integers_to_u32(v),
        DecodingResult::I64(v) => integers_to_u32(v),
        DecodingResult::F32(_) | DecodingResult::F64(_) => Err(IoError::InvalidData(
            "label raster must hold integer samples".into(),
        )),
    }
}

/// Decode a chunky (band-interleaved) TIFF of any sample type into an
/// [`Image`] plus its georeferencing.
pub fn read_image(path: &Path) -> IoResult<(Image, RasterGeometry)> {
    let mut decoder = open(path)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    let geometry = read_geometry(&mut decoder, rows, cols)?;

    let data = samples_to_f32(decoder.read_image()?);
    let n_pixels = rows * cols;
    if n_pixels == 0 || data.len() % n_pixels != 0 {
        return Err(IoError::InvalidData(format!(
            "{} samples do not divide into {}×{} pixels",
            data.len(),
            rows,
            cols
        )));
    }
    let bands = data.len() / n_pixels;
    debug!(path = %path.display(), rows, cols, bands, "image decoded");

    let image = Image::from_interleaved(data, rows, cols, bands)?;
    Ok((image, geometry))
}

/// Decode a single-band integer TIFF (segment ids or class codes).
pub fn read_label_raster(path: &Path) -> IoResult<(SegmentMap, RasterGeometry)> {
    let mut decoder = open(path)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    let geometry = read_geometry(&mut decoder, rows, cols)?;

    let labels = samples_to_labels(decoder.read_image()?)?;
    if labels.len() != rows * cols {
        return Err(IoError::InvalidData(format!(
            "label raster has {} samples for {}×{} pixels; expected a single band",
            labels.len(),
            rows,
            cols
        )));
    }
    Ok((SegmentMap::new(labels, rows, cols)?, geometry))
}

/// Write `labels` (row-major, shaped like `geometry`) as a single-band u16
/// GeoTIFF carrying the geotransform and projection.
pub fn write_label_raster(path: &Path, labels: &[u32], geometry: &RasterGeometry) -> IoResult<()> {
    let (rows, cols) = geometry.shape();
    if labels.len() != rows * cols {
        return Err(IoError::InvalidData(format!(
            "{} labels for a {}×{} grid",
            labels.len(),
            rows,
            cols
        )));
    }
    let data: Vec<u16> = labels
        .iter()
        .map(|&v| {
            u16::try_from(v).map_err(|_| IoError::InvalidData(format!("label {v} does not fit in u16")))
        })
        .collect::<IoResult<_>>()?;

    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<Gray16>(cols as u32, rows as u32)?;

    let t = &geometry.transform.0;
    let dir = image.encoder();
    if t[2] == 0.0 && t[4] == 0.0 {
        dir.write_tag(Tag::ModelPixelScaleTag, &[t[1], -t[5], 0.0][..])?;
        dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, t[0], t[3], 0.0][..])?;
    } else {
        let matrix = [
            t[1], t[2], 0.0, t[0], //
            t[4], t[5], 0.0, t[3], //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }
    dir.write_tag(Tag::GeoKeyDirectoryTag, &EMPTY_GEOKEY_DIRECTORY[..])?;
    if !geometry.projection.is_empty() {
        let ascii = format!("{}|", geometry.projection);
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }

    image.write_data(&data)?;
    debug!(path = %path.display(), rows, cols, "label raster written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiff::encoder::colortype::{Gray32Float, RGB8};

    fn utm_geometry(rows: usize, cols: usize) -> RasterGeometry {
        RasterGeometry::new(
            rows,
            cols,
            GeoTransform::from_tiepoint((10.0, 10.0), (0.0, 0.0, 500_000.0, 4_200_000.0)),
            "EPSG:32633",
        )
    }

    #[test]
    fn label_raster_round_trips_with_georeferencing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.tif");
        let geom = utm_geometry(3, 4);
        let labels: Vec<u32> = (0..12).map(|i| i * 100).collect();

        write_label_raster(&path, &labels, &geom).unwrap();
        let (map, read_geom) = read_label_raster(&path).unwrap();

        assert_eq!(map.data, labels);
        assert_eq!(map.shape(), (3, 4));
        assert_eq!(read_geom, geom);
    }

    #[test]
    fn rotated_transform_uses_transformation_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotated.tif");
        let geom = RasterGeometry::new(2, 2, GeoTransform::new([100.0, 1.0, 0.5, 200.0, 0.25, -1.0]), "");

        write_label_raster(&path, &[1, 2, 3, 4], &geom).unwrap();
        let (_, read_geom) = read_label_raster(&path).unwrap();
        assert_eq!(read_geom.transform, geom.transform);
        assert!(read_geom.projection.is_empty());
    }

    #[test]
    fn oversized_labels_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.tif");
        let err = write_label_raster(&path, &[70_000], &RasterGeometry::pixel_grid(1, 1)).unwrap_err();
        assert!(matches!(err, IoError::InvalidData(_)));
    }

    #[test]
    fn multiband_image_is_read_interleaved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rgb.tif");
        let data: Vec<u8> = (0..2 * 3 * 3).map(|v| v as u8).collect();
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            encoder.write_image::<RGB8>(3, 2, &data).unwrap();
        }

        let (img, geom) = read_image(&path).unwrap();
        assert_eq!(img.shape(), (2, 3));
        assert_eq!(img.bands, 3);
        assert_eq!(img.pixel(1, 0), &[9.0, 10.0, 11.0]);
        assert_eq!(geom.transform, GeoTransform::identity());
    }

    #[test]
    fn malformed_tiepoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad_tiepoint.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            let mut image = encoder.new_image::<Gray16>(2, 1).unwrap();
            let tags = image.encoder();
            tags.write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..]).unwrap();
            tags.write_tag(Tag::ModelTiepointTag, "not numbers").unwrap();
            image.write_data(&[1u16, 2]).unwrap();
        }
        assert!(matches!(read_label_raster(&path), Err(IoError::Tiff(_))));
        assert!(matches!(read_image(&path), Err(IoError::Tiff(_))));
    }

    #[test]
    fn float_label_raster_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            encoder.write_image::<Gray32Float>(2, 1, &[0.5f32, 1.5]).unwrap();
        }
        assert!(matches!(read_label_raster(&path), Err(IoError::InvalidData(_))));
        let (img, _) = read_image(&path).unwrap();
        assert_eq!(img.data, vec![0.5, 1.5]);
    }
}
