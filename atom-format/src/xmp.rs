//! The seam to an external XMP store.
//!
//! The engine never interprets XMP itself. It extracts the packet from the
//! file, hands it to an [`XmpHandler`], forwards the tag operations and stores
//! whatever packet the handler produces afterwards.

use crate::{
    atom::Atom,
    error::{EditError, XmpError},
    fourcc::FourCC,
    kind::constants::UUID,
    editor::DataMode,
    tags::{known_path, paths, Geotag},
};

/// User type of the `uuid` atom some writers store XMP in.
pub const XMP_UUID: [u8; 16] = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac,
];

/// An XMP property store.
pub trait XmpHandler {
    /// Loads a packet. An empty slice means the file has none yet.
    fn set_xmp_data_to_be_processed(&mut self, data: &[u8]) -> Result<(), XmpError>;

    /// The packet with every change applied so far.
    fn processed_data(&self) -> Result<Vec<u8>, XmpError>;

    fn set_title(&mut self, title: &str) -> Result<(), XmpError>;
    fn remove_title(&mut self) -> Result<(), XmpError>;
    fn set_description(&mut self, description: &str) -> Result<(), XmpError>;
    fn remove_description(&mut self) -> Result<(), XmpError>;
    fn set_author(&mut self, author: &str) -> Result<(), XmpError>;
    fn remove_author(&mut self) -> Result<(), XmpError>;
    fn set_keywords(&mut self, keywords: &[String]) -> Result<(), XmpError>;
    fn set_gps_string(&mut self, gps: &str) -> Result<(), XmpError>;
    fn remove_gps_string(&mut self) -> Result<(), XmpError>;
    fn set_geotag(&mut self, geotag: &Geotag) -> Result<(), XmpError>;
    fn remove_geotag(&mut self) -> Result<(), XmpError>;
    fn remove_all(&mut self) -> Result<(), XmpError>;
}

/// Where the packet of a file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmpLocation {
    /// `moov.udta.XMP_`, also where new packets go.
    UserData,
    /// The payload of a top-level `uuid` atom, after the user type.
    Uuid,
}

fn is_xmp_uuid(atom: &mut Atom) -> bool {
    if atom.name() != UUID || atom.expand() {
        return false;
    }
    atom.data().map_or(false, |data| data.starts_with(&XMP_UUID))
}

/// Finds the XMP packet of the tree below `root`, preferring `moov.udta.XMP_`.
pub fn find_packet(root: &mut Atom) -> Option<(XmpLocation, Vec<u8>)> {
    if let Some(atom) = root.find_atom(&known_path(paths::XMP)) {
        if !atom.expand() {
            let data = atom.data().unwrap_or_default().to_vec();
            return Some((XmpLocation::UserData, data));
        }
    }

    root.expand();
    let atom = first_uuid_packet(root.children_mut()?)?;
    let data = atom.data().unwrap_or_default()[XMP_UUID.len()..].to_vec();
    Some((XmpLocation::Uuid, data))
}

fn first_uuid_packet(children: &mut [Atom]) -> Option<&mut Atom> {
    for atom in children.iter_mut() {
        if is_xmp_uuid(atom) {
            return Some(atom);
        }
    }
    None
}

/// Stores `packet` at `location`, creating `moov.udta.XMP_` when needed.
pub fn store_packet(
    root: &mut Atom,
    location: XmpLocation,
    packet: &[u8],
) -> Result<(), EditError> {
    if location == XmpLocation::Uuid {
        root.expand();
        if let Some(atom) = root.children_mut().and_then(|c| first_uuid_packet(c)) {
            let mut data = XMP_UUID.to_vec();
            data.extend_from_slice(packet);
            atom.set_data(data);
            return Ok(());
        }
    }
    root.set_atom_data(packet, &known_path(paths::XMP), DataMode::Direct)
}

/// Removes every top-level XMP `uuid` atom, returning how many there were.
pub fn remove_uuid_packets(root: &mut Atom) -> usize {
    root.expand();
    let children = match root.children_mut() {
        Some(children) => children,
        None => return 0,
    };
    let before = children.len();
    children.retain_mut(|c| !is_xmp_uuid(c));
    let removed = before - children.len();
    if removed > 0 {
        tracing::debug!(removed, name = %FourCC(UUID), "removed XMP atoms");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::AtomKind;

    fn uuid_atom(user_type: &[u8; 16], packet: &[u8]) -> Atom {
        let mut data = user_type.to_vec();
        data.extend_from_slice(packet);
        Atom::new(FourCC(UUID), AtomKind::Data, data)
    }

    #[test]
    fn prefers_user_data_packet() {
        let mut root = Atom::root();
        root.add_child(uuid_atom(&XMP_UUID, b"<uuid/>")).unwrap();
        store_packet(&mut root, XmpLocation::UserData, b"<udta/>").unwrap();

        let (location, packet) = find_packet(&mut root).unwrap();
        assert_eq!(location, XmpLocation::UserData);
        assert_eq!(packet, b"<udta/>");
    }

    #[test]
    fn falls_back_to_uuid_atom() {
        let mut root = Atom::root();
        root.add_child(uuid_atom(&[0; 16], b"other")).unwrap();
        root.add_child(uuid_atom(&XMP_UUID, b"<x/>")).unwrap();

        let (location, packet) = find_packet(&mut root).unwrap();
        assert_eq!(location, XmpLocation::Uuid);
        assert_eq!(packet, b"<x/>");

        store_packet(&mut root, location, b"<y/>").unwrap();
        assert_eq!(root.children()[1].data().unwrap()[16..], *b"<y/>");
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn no_packet() {
        let mut root = Atom::root();
        assert!(find_packet(&mut root).is_none());
        assert_eq!(remove_uuid_packets(&mut root), 0);
    }

    #[test]
    fn removes_only_xmp_uuid_atoms() {
        let mut root = Atom::root();
        root.add_child(uuid_atom(&XMP_UUID, b"a")).unwrap();
        root.add_child(uuid_atom(&[1; 16], b"b")).unwrap();
        root.add_child(uuid_atom(&XMP_UUID, b"c")).unwrap();

        assert_eq!(remove_uuid_packets(&mut root), 2);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].data().unwrap()[0], 1);
    }
}
