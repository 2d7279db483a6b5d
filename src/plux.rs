//! Reader for the PLUx container format.
//!
//! A PLUx file is a ZIP archive (classic deflate, no encryption) with a
//! required `index.xml`, an optional `recipe.txt` in the same XML
//! dialect, and one raw little-endian float32 blob per layer, named by
//! the layer's `FILENAME_Z` element.  Values are micrometres; NaN
//! samples denote missing pixels and are turned into a mask.
//!
//! ```rust,no_run
//! let data = scanprobe::plux::load("measurement.plux")?;
//! for channel in &data.channels {
//!     println!("layer {}: {}×{}", channel.id, channel.field.xres(), channel.field.yres());
//! }
//! # Ok::<(), scanprobe::Error>(())
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use quick_xml::{events::Event, Reader as XmlReader};
use zip::{result::ZipError, ZipArchive};

use crate::{Error, Field, SiUnit};

// ======================================================================
// CONST - PRIVATE

const UTF8_BOM: &str = "\u{feff}";

/// Raw layer values are micrometres.
const MICRO: f64 = 1e-6;

// ======================================================================
// PluxChannel - PUBLIC

/// One data layer of a PLUx archive.
#[derive(Clone, Debug)]
pub struct PluxChannel {
    /// Layer number from the `LAYER_<i>` element name.
    pub id: i32,
    /// Height data in metres; missing pixels are replaced by the mean.
    pub field: Field,
    /// Mask of missing (NaN) pixels, if there were any.
    pub mask: Option<Field>,
    /// Channel title.
    pub title: String,
    /// Human-readable metadata from the index and recipe documents.
    pub meta: BTreeMap<String, String>,
}

// ======================================================================
// PluxData - PUBLIC

/// Contents of a PLUx archive.
#[derive(Clone, Debug)]
pub struct PluxData {
    /// The data layers, in declaration order.
    pub channels: Vec<PluxChannel>,
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Loads a PLUx file from disk.
///
/// # Errors
///
/// [`Error::Io`] on file system or ZIP trouble, [`Error::Parse`] on
/// malformed XML or numbers, [`Error::MissingKey`] when `index.xml` or a
/// required element is absent, [`Error::SizeMismatch`] when a raw blob
/// does not match the declared dimensions, and [`Error::NoData`] when no
/// layer is declared.
pub fn load(path: impl AsRef<Path>) -> Result<PluxData, Error> {
    let file = File::open(path)?;
    load_from(BufReader::new(file))
}

/// Loads a PLUx archive from any seekable reader; see [`load`].
pub fn load_from<R: Read + Seek>(reader: R) -> Result<PluxData, Error> {
    let mut archive = ZipArchive::new(reader).map_err(zip_error)?;

    // INDEX

    let content = read_member(&mut archive, "index.xml")?.ok_or_else(|| Error::MissingKey {
        key: "index.xml".to_owned(),
    })?;
    let mut hash = HashMap::new();
    let mut layers = Vec::new();
    parse_document(&content, &mut hash, Some(&mut layers))?;

    if layers.is_empty() {
        return Err(Error::NoData);
    }

    // RECIPE
    //
    // The file tends to be named `./recipe.txt` in the archive; a recipe
    // that fails to parse is dropped, it only carries metadata.

    let mut recipe = None;
    for name in ["recipe.txt", "./recipe.txt"] {
        if let Some(content) = read_member(&mut archive, name)? {
            let mut map = HashMap::new();
            match parse_document(&content, &mut map, None) {
                Ok(()) => recipe = Some(map),
                Err(err) => log::warn!("ignoring unparseable recipe: {}", err),
            }
            break;
        }
    }

    // GEOMETRY

    for key in [
        "/xml/GENERAL/IMAGE_SIZE_X",
        "/xml/GENERAL/IMAGE_SIZE_Y",
        "/xml/GENERAL/FOV_X",
        "/xml/GENERAL/FOV_Y",
    ] {
        if !hash.contains_key(key) {
            return Err(Error::MissingKey {
                key: key.to_owned(),
            });
        }
    }

    let xres = parse_dimension(&hash, "/xml/GENERAL/IMAGE_SIZE_X")?;
    let yres = parse_dimension(&hash, "/xml/GENERAL/IMAGE_SIZE_Y")?;
    let fov_x = parse_fov(&hash, "/xml/GENERAL/FOV_X");
    let fov_y = parse_fov(&hash, "/xml/GENERAL/FOV_Y");
    let xreal = xres as f64 * fov_x * MICRO;
    let yreal = yres as f64 * fov_y * MICRO;

    // LAYERS

    let meter = SiUnit::meter();
    let mut channels = Vec::new();
    for &id in layers.iter() {
        let filename = match hash.get(&format!("/xml/LAYER_{}/FILENAME_Z", id)) {
            Some(filename) => filename.clone(),
            None => {
                log::debug!("layer {} has no FILENAME_Z, skipping", id);
                continue;
            }
        };

        let raw = read_member_bytes(&mut archive, &filename)?.ok_or_else(|| Error::MissingKey {
            key: filename.clone(),
        })?;
        let expected = xres * yres * 4;
        if raw.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                got: raw.len(),
            });
        }

        let mut samples = vec![0.0f32; xres * yres];
        (&raw[..]).read_f32_into::<LittleEndian>(&mut samples)?;

        let mut field = Field::new(xres, yres, xreal, yreal);
        field.set_si_unit_xy(meter.clone());
        field.set_si_unit_z(meter.clone());
        for (z, &sample) in field.data_mut().iter_mut().zip(samples.iter()) {
            *z = sample as f64 * MICRO;
        }

        let mask = mask_of_nans(&mut field);

        channels.push(PluxChannel {
            id,
            field,
            mask,
            title: "Z".to_owned(),
            meta: channel_metadata(&hash, recipe.as_ref(), id),
        });
    }

    Ok(PluxData { channels })
}

// ======================================================================
// FUNCTIONS - PRIVATE - archive access

fn zip_error(err: ZipError) -> Error {
    match err {
        ZipError::Io(err) => Error::Io(err),
        other => Error::Parse {
            reason: format!("ZIP: {}", other),
        },
    }
}

fn read_member_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, Error> {
    let mut member = match archive.by_name(name) {
        Ok(member) => member,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(zip_error(err)),
    };
    let mut bytes = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn read_member<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, Error> {
    let bytes = match read_member_bytes(archive, name)? {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    let content = String::from_utf8(bytes).map_err(|_| Error::Parse {
        reason: format!("{} is not valid UTF-8", name),
    })?;
    Ok(Some(content))
}

// ======================================================================
// FUNCTIONS - PRIVATE - XML

/// Streams an XML document into a path → text mapping; when `layers` is
/// given, `/xml/LAYER_<i>` elements are recorded as declared layers.
fn parse_document(
    content: &str,
    map: &mut HashMap<String, String>,
    mut layers: Option<&mut Vec<i32>>,
) -> Result<(), Error> {
    // Normalise CRLF and strip the BOM the XML people tend to use.
    let content = content.replace('\r', "");
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);

    let mut reader = XmlReader::from_str(content);
    reader.trim_text(true);

    let mut path = String::new();
    loop {
        match reader.read_event() {
            Err(err) => {
                return Err(Error::Parse {
                    reason: format!("XML: {}", err),
                });
            }

            Ok(Event::Eof) => break,

            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                path.push('/');
                path.push_str(&name);

                if let Some(layers) = layers.as_mut() {
                    if let Some(rest) = path.strip_prefix("/xml/LAYER_") {
                        if !rest.contains('/') {
                            if let Ok(id) = rest.parse::<i32>() {
                                layers.push(id);
                            }
                        }
                    }
                }
            }

            Ok(Event::End(end)) => {
                let n = end.name().as_ref().len();
                path.truncate(path.len() - n - 1);
            }

            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|err| Error::Parse {
                    reason: format!("XML: {}", err),
                })?;
                let text = text.trim();
                if !text.is_empty() {
                    map.insert(path.clone(), text.to_owned());
                }
            }

            Ok(_) => {}
        }
    }

    Ok(())
}

// ======================================================================
// FUNCTIONS - PRIVATE - values

fn parse_dimension(hash: &HashMap<String, String>, key: &str) -> Result<usize, Error> {
    let value = &hash[key];
    let dimension: usize = value.trim().parse().map_err(|_| Error::Parse {
        reason: format!("bad dimension {:?} at {}", value, key),
    })?;
    if dimension == 0 {
        return Err(Error::Parse {
            reason: format!("zero dimension at {}", key),
        });
    }
    Ok(dimension)
}

/// Field-of-view factor; zero or garbage is forced to 1.0 with a
/// warning, matching the established behaviour for broken files.
fn parse_fov(hash: &HashMap<String, String>, key: &str) -> f64 {
    let fov = hash[key].trim().parse::<f64>().unwrap_or(0.0).abs();
    if fov > 0.0 {
        fov
    } else {
        log::warn!("{} is 0.0, fixing to 1.0", key);
        1.0
    }
}

/// Replaces NaN samples by the mean of the valid ones and returns the
/// NaN map as a mask field, or `None` when there was nothing to mask.
fn mask_of_nans(field: &mut Field) -> Option<Field> {
    let mut mask = Field::new_alike(field);
    let mut nans = 0usize;
    let mut sum = 0.0;
    {
        let data = field.data();
        let mask_data = mask.data_mut();
        for (k, &z) in data.iter().enumerate() {
            if z.is_nan() {
                mask_data[k] = 1.0;
                nans += 1;
            } else {
                sum += z;
            }
        }
    }
    if nans == 0 {
        return None;
    }

    let substitute = if nans == field.data().len() {
        0.0
    } else {
        sum / (field.data().len() - nans) as f64
    };
    for z in field.data_mut().iter_mut() {
        if z.is_nan() {
            *z = substitute;
        }
    }
    Some(mask)
}

// ======================================================================
// FUNCTIONS - PRIVATE - metadata

fn channel_metadata(
    hash: &HashMap<String, String>,
    recipe: Option<&HashMap<String, String>>,
    id: i32,
) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();

    if let Some(value) = hash.get("/xml/GENERAL/AUTHOR") {
        meta.insert("General::Author".to_owned(), value.clone());
    }
    if let Some(value) = hash.get("/xml/GENERAL/DATE") {
        meta.insert("General::Date".to_owned(), value.clone());
    }

    if let Some(n) = hash
        .get("/xml/INFO/SIZE")
        .and_then(|value| value.trim().parse::<usize>().ok())
    {
        for i in 0..n {
            let name = hash.get(&format!("/xml/INFO/ITEM_{}/NAME", i));
            let value = hash.get(&format!("/xml/INFO/ITEM_{}/VALUE", i));
            if let (Some(name), Some(value)) = (name, value) {
                if !name.is_empty() && !value.is_empty() {
                    meta.insert(format!("Info::{}", name), value.clone());
                }
            }
        }
    }

    for c in ['X', 'Y', 'Z'] {
        if let Some(value) = hash.get(&format!("/xml/LAYER_{}/POSITION_{}", id, c)) {
            meta.insert(format!("Layer::Position {}", c), format!("{} µm", value));
        }
    }

    if let Some(recipe) = recipe {
        for (path, value) in recipe.iter() {
            if let Some(name) = prettify_recipe_key(path) {
                meta.insert(name, value.clone());
            }
        }
    }

    meta
}

/// `/xml/SCAN/SPEED_FAST` becomes `Scan::Speed Fast`; FOVINBLACK
/// entries are internal and dropped.
fn prettify_recipe_key(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/xml/")?;
    if path.ends_with("/FOVINBLACK") {
        return None;
    }

    let raw = rest.replace('/', "::");
    let mut name = String::with_capacity(raw.len());
    let mut keepcap = true;
    for c in raw.chars() {
        if c == '_' {
            name.push(' ');
            keepcap = true;
        } else if c == ':' {
            name.push(c);
            keepcap = true;
        } else if keepcap {
            name.push(c);
            keepcap = false;
        } else {
            name.push(c.to_ascii_lowercase());
        }
    }
    Some(name)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::{write::FileOptions, ZipWriter};

    use super::*;

    const INDEX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xml>
  <GENERAL>
    <IMAGE_SIZE_X>4</IMAGE_SIZE_X>
    <IMAGE_SIZE_Y>3</IMAGE_SIZE_Y>
    <FOV_X>2.5</FOV_X>
    <FOV_Y>2.5</FOV_Y>
    <AUTHOR>operator</AUTHOR>
    <DATE>2015-06-01</DATE>
  </GENERAL>
  <INFO>
    <SIZE>1</SIZE>
    <ITEM_0>
      <NAME>Objective</NAME>
      <VALUE>20x</VALUE>
    </ITEM_0>
  </INFO>
  <LAYER_0>
    <FILENAME_Z>LAYER_0.raw</FILENAME_Z>
    <POSITION_X>1.5</POSITION_X>
    <POSITION_Y>-2.5</POSITION_Y>
    <POSITION_Z>10</POSITION_Z>
  </LAYER_0>
</xml>
"#;

    const RECIPE_TXT: &str = r#"<xml>
  <SCAN>
    <SPEED_FAST>1x</SPEED_FAST>
    <FOVINBLACK>1</FOVINBLACK>
  </SCAN>
</xml>
"#;

    fn layer_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn build_archive(members: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in members {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap()
    }

    fn default_values() -> Vec<f32> {
        (0..12).map(|i| i as f32).collect()
    }

    // ============================================================
    // HAPPY PATH

    #[test]
    fn full_archive_is_read() {
        let values = default_values();
        let archive = build_archive(&[
            ("index.xml", INDEX_XML.as_bytes()),
            ("./recipe.txt", RECIPE_TXT.as_bytes()),
            ("LAYER_0.raw", &layer_bytes(&values)),
        ]);

        let data = load_from(archive).unwrap();
        assert_eq!(data.channels.len(), 1);

        let channel = &data.channels[0];
        assert_eq!(channel.id, 0);
        assert_eq!(channel.title, "Z");
        assert_eq!(channel.field.xres(), 4);
        assert_eq!(channel.field.yres(), 3);
        assert_near!(channel.field.xreal(), 4.0 * 2.5 * 1e-6, 1e-18);
        assert_near!(channel.field.yreal(), 3.0 * 2.5 * 1e-6, 1e-18);
        assert_eq!(channel.field.si_unit_z(), &SiUnit::meter());
        assert!(channel.mask.is_none());

        // Values are micrometres in the file.
        assert_near!(channel.field.get(1, 0), 1.0 * 1e-6, 1e-18);
        assert_near!(channel.field.get(3, 2), 11.0 * 1e-6, 1e-18);

        assert_eq!(channel.meta["General::Author"], "operator");
        assert_eq!(channel.meta["General::Date"], "2015-06-01");
        assert_eq!(channel.meta["Info::Objective"], "20x");
        assert_eq!(channel.meta["Layer::Position X"], "1.5 µm");
        assert_eq!(channel.meta["Layer::Position Z"], "10 µm");
        assert_eq!(channel.meta["Scan::Speed Fast"], "1x");
        assert!(!channel.meta.contains_key("Scan::Fovinblack"));
    }

    #[test]
    fn nan_samples_become_mask_pixels() {
        let mut values = default_values();
        values[5] = f32::NAN;
        let archive = build_archive(&[
            ("index.xml", INDEX_XML.as_bytes()),
            ("LAYER_0.raw", &layer_bytes(&values)),
        ]);

        let data = load_from(archive).unwrap();
        let channel = &data.channels[0];
        let mask = channel.mask.as_ref().unwrap();

        assert_eq!(mask.get(1, 1), 1.0);
        assert_eq!(mask.get(0, 0), 0.0);
        assert!(channel.field.get(1, 1).is_finite());
    }

    #[test]
    fn bom_and_crlf_are_tolerated() {
        let index = format!("\u{feff}{}", INDEX_XML.replace('\n', "\r\n"));
        let archive = build_archive(&[
            ("index.xml", index.as_bytes()),
            ("LAYER_0.raw", &layer_bytes(&default_values())),
        ]);

        assert_eq!(load_from(archive).unwrap().channels.len(), 1);
    }

    #[test]
    fn zero_fov_is_forced_positive() {
        let index = INDEX_XML.replace("<FOV_X>2.5</FOV_X>", "<FOV_X>0</FOV_X>");
        let archive = build_archive(&[
            ("index.xml", index.as_bytes()),
            ("LAYER_0.raw", &layer_bytes(&default_values())),
        ]);

        let data = load_from(archive).unwrap();
        assert_near!(data.channels[0].field.xreal(), 4.0 * 1e-6, 1e-18);
    }

    // ============================================================
    // ERRORS

    #[test]
    fn missing_index_is_reported() {
        let archive = build_archive(&[("other.txt", b"hello")]);
        let result = load_from(archive);
        assert!(matches!(result, Err(Error::MissingKey { key }) if key == "index.xml"));
    }

    #[test]
    fn missing_required_leaf_is_reported() {
        let index = INDEX_XML.replace("<IMAGE_SIZE_X>4</IMAGE_SIZE_X>", "");
        let archive = build_archive(&[("index.xml", index.as_bytes())]);

        let result = load_from(archive);
        assert!(
            matches!(result, Err(Error::MissingKey { key }) if key == "/xml/GENERAL/IMAGE_SIZE_X")
        );
    }

    #[test]
    fn raw_size_mismatch_is_reported() {
        let archive = build_archive(&[
            ("index.xml", INDEX_XML.as_bytes()),
            ("LAYER_0.raw", &layer_bytes(&[1.0, 2.0])),
        ]);

        let result = load_from(archive);
        assert!(matches!(
            result,
            Err(Error::SizeMismatch {
                expected: 48,
                got: 8
            })
        ));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let archive = build_archive(&[("index.xml", b"<xml><GENERAL></xml>")]);
        let result = load_from(archive);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn no_declared_layers_is_reported() {
        let index = "<xml><GENERAL><IMAGE_SIZE_X>4</IMAGE_SIZE_X></GENERAL></xml>";
        let archive = build_archive(&[("index.xml", index.as_bytes())]);
        assert!(matches!(load_from(archive), Err(Error::NoData)));
    }

    #[test]
    fn layer_without_filename_is_skipped() {
        let index = INDEX_XML.replace(
            "<FILENAME_Z>LAYER_0.raw</FILENAME_Z>",
            "",
        );
        let archive = build_archive(&[("index.xml", index.as_bytes())]);

        let data = load_from(archive).unwrap();
        assert!(data.channels.is_empty());
    }

    #[test]
    fn not_a_zip_is_reported() {
        let result = load_from(Cursor::new(b"definitely not a zip".to_vec()));
        assert!(result.is_err());
    }
}
