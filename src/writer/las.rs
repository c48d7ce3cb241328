use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;
use crate::filter::FilterResult;
use crate::model::metadata::Metadata;
use crate::writer::totals_of;

const HEADER_SIZE: usize = 227;
const POINT_RECORD_LENGTH: usize = 26;
// 32 bytes, padded with trailing spaces
const SOFTWARE_ID: &[u8; 32] = b"PotreeElevationProfile          ";

/// LAS 1.2, point data record format 2. Positions are quantized against the
/// dataset offset and scale; header extents come from the dataset metadata,
/// not from the accepted points.
pub fn write_las(
	results: &[FilterResult],
	metadata: &Metadata,
	out: &mut dyn Write,
) -> Result<(), Error> {
	let num_points = totals_of(results).points_accepted as u32;
	let bounds = &metadata.bounding_box;
	let scale = metadata.scale_triple();

	let mut header = [0u8; HEADER_SIZE];
	header[0..4].copy_from_slice(b"LASF");
	// file source id, global encoding and project id stay zero
	header[24] = 1; // version major
	header[25] = 2; // version minor
	header[26..58].copy_from_slice(SOFTWARE_ID); // system identifier
	header[58..90].copy_from_slice(SOFTWARE_ID); // generating software
	// file creation day and year stay zero
	LittleEndian::write_u16(&mut header[94..96], HEADER_SIZE as u16);
	LittleEndian::write_u32(&mut header[96..100], HEADER_SIZE as u32); // offset to point data
	// number of variable length records stays zero
	header[104] = 2; // point data record format
	LittleEndian::write_u16(&mut header[105..107], POINT_RECORD_LENGTH as u16);
	LittleEndian::write_u32(&mut header[107..111], num_points);
	// number of points by return: everything counts as first return
	LittleEndian::write_u32(&mut header[111..115], num_points);
	LittleEndian::write_f64(&mut header[131..139], scale.x);
	LittleEndian::write_f64(&mut header[139..147], scale.y);
	LittleEndian::write_f64(&mut header[147..155], scale.z);
	LittleEndian::write_f64(&mut header[155..163], bounds.lx); // x offset
	LittleEndian::write_f64(&mut header[163..171], bounds.ly);
	LittleEndian::write_f64(&mut header[171..179], bounds.lz);
	LittleEndian::write_f64(&mut header[179..187], bounds.ux); // max x
	LittleEndian::write_f64(&mut header[187..195], bounds.lx); // min x
	LittleEndian::write_f64(&mut header[195..203], bounds.uy);
	LittleEndian::write_f64(&mut header[203..211], bounds.ly);
	LittleEndian::write_f64(&mut header[211..219], bounds.uz);
	LittleEndian::write_f64(&mut header[219..227], bounds.lz);
	out.write_all(&header).map_err(Error::Encode)?;

	let mut record = [0u8; POINT_RECORD_LENGTH];
	for result in results {
		for point in &result.points {
			LittleEndian::write_i32(
				&mut record[0..4],
				((point.position.x - bounds.lx) / scale.x) as i32,
			);
			LittleEndian::write_i32(
				&mut record[4..8],
				((point.position.y - bounds.ly) / scale.y) as i32,
			);
			LittleEndian::write_i32(
				&mut record[8..12],
				((point.position.z - bounds.lz) / scale.z) as i32,
			);
			LittleEndian::write_u16(&mut record[12..14], point.intensity);
			// return, classification and scan fields stay zero
			LittleEndian::write_u16(&mut record[20..22], u16::from(point.color.x));
			LittleEndian::write_u16(&mut record[22..24], u16::from(point.color.y));
			LittleEndian::write_u16(&mut record[24..26], u16::from(point.color.z));
			out.write_all(&record).map_err(Error::Encode)?;
		}
	}

	Ok(())
}
