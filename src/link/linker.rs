//! The linker: objects grouped into sections, placed into regions, with
//! reachability and relocation resolution (spec section 4.5).
//!
//! Placement is single-pass and non-backtracking, mirroring the source: an
//! object that does not fit in its region is simply left unplaced. Unlike
//! the source, an unplaced-but-referenced object is reported as a
//! diagnostic rather than silently dropped (spec section 9, open question).

use crate::common::{CompileContext, DiagKind, Id, Location, Map, ObjectId};
use crate::link::object::{LinkerObject, ObjectFlags, ObjectType};
use crate::link::reference::ReferenceFlags;
use crate::link::region::LinkerRegion;
use crate::link::section::{LinkerSection, SectionType};

/// The assembled memory image: a flat 64 KiB main-memory buffer plus one
/// 16 KiB buffer per referenced cartridge bank.
#[derive(Debug, Default)]
pub struct Image {
    pub main: Vec<u8>,
    pub banks: Map<i32, Vec<u8>>,
}

impl Image {
    pub fn new() -> Self {
        Image {
            main: vec![0u8; 0x10000],
            banks: Map::new(),
        }
    }

    fn write(&mut self, bank: i32, region_start: u32, address: u32, value: u8) {
        if bank < 0 {
            self.main[address as usize] = value;
        } else {
            let buf = self.banks.entry(bank).or_insert_with(|| vec![0u8; 0x4000]);
            let off = (address - region_start) as usize;
            if off < buf.len() {
                buf[off] = value;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Linker {
    pub objects: Vec<LinkerObject>,
    pub sections: Map<Id, LinkerSection>,
    pub regions: Vec<LinkerRegion>,
    by_ident: Map<Id, ObjectId>,
    /// `0x0801` for a `PRG` target; unused (but not cleared, mirroring the
    /// source) for cartridge targets.
    pub program_start: u32,
    pub program_end: u32,
}

impl Linker {
    pub fn new() -> Self {
        Linker {
            program_start: 0x0801,
            ..Default::default()
        }
    }

    pub fn add_region(&mut self, ident: Id, start: u32, end: u32, cartridge_bank: i32) {
        self.regions.push(LinkerRegion::new(ident, start, end, cartridge_bank));
    }

    pub fn add_section(&mut self, ident: Id, kind: SectionType) {
        self.sections.insert(ident, LinkerSection::new(ident, kind));
    }

    /// Push a section onto a region; registration order is placement order.
    pub fn bind_section(&mut self, region_ident: Id, section_ident: Id) {
        if let Some(region) = self.regions.iter_mut().find(|r| r.ident == region_ident) {
            region.sections.push(section_ident);
        }
    }

    pub fn add_object(&mut self, ident: Id, kind: ObjectType, section_ident: Id) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(LinkerObject::new(id, ident, kind, section_ident));
        self.by_ident.insert(ident, id);
        if let Some(section) = self.sections.get_mut(&section_ident) {
            section.objects.push(id);
        }
        id
    }

    pub fn object(&self, id: ObjectId) -> &LinkerObject {
        &self.objects[id.0 as usize]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut LinkerObject {
        &mut self.objects[id.0 as usize]
    }

    pub fn find_object(&self, ident: Id) -> Option<ObjectId> {
        self.by_ident.get(&ident).copied()
    }

    /// Mark every object transitively reachable from `roots` as `REFERENCED`.
    pub fn mark_reachable(&mut self, roots: &[ObjectId]) {
        let mut stack: Vec<ObjectId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            let obj = &mut self.objects[id.0 as usize];
            if obj.flags.contains(ObjectFlags::REFERENCED) {
                continue;
            }
            obj.flags.insert(ObjectFlags::REFERENCED);
            let targets: Vec<ObjectId> = obj.references.iter().map(|r| r.ref_object).collect();
            stack.extend(targets);
        }
    }

    /// Sequentially place every referenced, unplaced object of `section_id`
    /// starting at `base`, returning the number of bytes consumed.
    fn place_section_at(&mut self, section_id: Id, region_ident: Id, bank: i32, base: u32, limit: u32) -> u32 {
        let object_ids = self.sections.get(&section_id).map(|s| s.objects.clone()).unwrap_or_default();
        let mut cursor = base;
        let mut nonzero = 0u32;
        let is_data = self.sections.get(&section_id).map(|s| s.kind == SectionType::Data).unwrap_or(false);

        for oid in object_ids {
            let obj = &mut self.objects[oid.0 as usize];
            if !obj.is_referenced() || obj.is_placed() {
                continue;
            }
            let size = obj.size();
            if cursor + size > limit {
                continue; // does not fit; stays unplaced (single-pass, non-backtracking)
            }
            obj.address = Some(cursor);
            obj.region = Some(region_ident);
            obj.cartridge_bank = bank;
            obj.flags.insert(ObjectFlags::PLACED);
            cursor += size;
            if is_data {
                nonzero = cursor - base;
            }
        }

        if let Some(section) = self.sections.get_mut(&section_id) {
            section.start = base;
            section.end = cursor;
        }
        if is_data {
            nonzero
        } else {
            cursor - base
        }
    }

    /// Run the full placement algorithm (spec 4.5): general object
    /// placement region-by-region, then the stack/heap tail layout.
    pub fn place(&mut self, ctx: &mut CompileContext) {
        let region_idents: Vec<Id> = self.regions.iter().map(|r| r.ident).collect();

        for region_ident in &region_idents {
            let (sections, bank) = {
                let region = self.regions.iter().find(|r| r.ident == *region_ident).unwrap();
                (region.sections.clone(), region.cartridge_bank)
            };

            for section_ident in &sections {
                let kind = self.sections.get(section_ident).map(|s| s.kind);
                if matches!(kind, Some(SectionType::Stack) | Some(SectionType::Heap)) {
                    continue; // handled in the dedicated tail pass below
                }
                let region = self.regions.iter().find(|r| r.ident == *region_ident).unwrap();
                let base = region.start + region.used;
                let limit = region.end;
                let used = self.place_section_at(*section_ident, *region_ident, bank, base, limit);
                let region = self.regions.iter_mut().find(|r| r.ident == *region_ident).unwrap();
                region.used += used;
                if matches!(kind, Some(SectionType::Data)) {
                    region.nonzero = region.nonzero.max(region.used);
                }
            }

            // Stack: reserve its declared size at the region's tail.
            for section_ident in &sections {
                if self.sections.get(section_ident).map(|s| s.kind) != Some(SectionType::Stack) {
                    continue;
                }
                let size: u32 = self
                    .sections
                    .get(section_ident)
                    .unwrap()
                    .objects
                    .iter()
                    .map(|id| self.object(*id).size())
                    .sum();
                let (bank, end) = {
                    let region = self.regions.iter().find(|r| r.ident == *region_ident).unwrap();
                    (region.cartridge_bank, region.end)
                };
                let start = end - size;
                self.place_section_at(*section_ident, *region_ident, bank, start, end);
                let region = self.regions.iter_mut().find(|r| r.ident == *region_ident).unwrap();
                region.end = start;
            }

            // Heap: fill whatever is left after data/bss and the stack tail.
            for section_ident in &sections {
                if self.sections.get(section_ident).map(|s| s.kind) != Some(SectionType::Heap) {
                    continue;
                }
                let (bank, start, end) = {
                    let region = self.regions.iter().find(|r| r.ident == *region_ident).unwrap();
                    (region.cartridge_bank, region.start + region.used, region.end)
                };
                self.place_section_at(*section_ident, *region_ident, bank, start, end);
            }
        }

        // SECTION_START / SECTION_END binder objects.
        for i in 0..self.objects.len() {
            let (kind, section, referenced, placed) = {
                let o = &self.objects[i];
                (o.kind, o.section, o.is_referenced(), o.is_placed())
            };
            if !referenced || placed {
                continue;
            }
            match kind {
                ObjectType::SectionStart => {
                    if let Some(s) = self.sections.get(&section) {
                        self.objects[i].address = Some(s.start);
                        self.objects[i].flags.insert(ObjectFlags::PLACED);
                    }
                }
                ObjectType::SectionEnd => {
                    if let Some(s) = self.sections.get(&section) {
                        self.objects[i].address = Some(s.end);
                        self.objects[i].flags.insert(ObjectFlags::PLACED);
                    }
                }
                _ => {}
            }
        }

        for obj in &self.objects {
            if obj.is_referenced() && !obj.is_placed() {
                ctx.diags.push(
                    Location::synthetic(),
                    DiagKind::Link,
                    format!("object '{}' is referenced but did not fit in any region", obj.ident),
                );
            }
        }
    }

    /// Copy every placed, referenced object's bytes into the image, then
    /// resolve relocations in place (spec 4.5, "Image write"/"Relocation
    /// resolution").
    pub fn write_image(&self, ctx: &mut CompileContext) -> Image {
        let mut image = Image::new();

        for obj in &self.objects {
            if !obj.is_referenced() || !obj.is_placed() {
                continue;
            }
            let addr = obj.address.unwrap();
            let region_start = obj
                .region
                .and_then(|r| self.regions.iter().find(|rg| rg.ident == r))
                .map(|r| r.start)
                .unwrap_or(0);
            for (i, &b) in obj.bytes.iter().enumerate() {
                image.write(obj.cartridge_bank, region_start, addr + i as u32, b);
            }
        }

        for obj in &self.objects {
            if !obj.is_referenced() || !obj.is_placed() {
                continue;
            }
            let region_start = obj
                .region
                .and_then(|r| self.regions.iter().find(|rg| rg.ident == r))
                .map(|r| r.start)
                .unwrap_or(0);
            for (ri, reference) in obj.references.iter().enumerate() {
                let target = &self.objects[reference.ref_object.0 as usize];
                if !target.is_referenced() || !target.is_placed() {
                    ctx.diags.push(
                        Location::synthetic(),
                        DiagKind::Link,
                        format!("relocation in '{}' targets unplaced object '{}'", obj.ident, target.ident),
                    );
                    continue;
                }
                let mut raddr = target.address.unwrap() as i64 + reference.ref_offset as i64;
                if reference.flags.contains(ReferenceFlags::TEMPORARY) {
                    raddr += *obj.temporaries.get(ri).unwrap_or(&0) as i64;
                }
                let write_addr = addr_at(obj, reference.offset);
                if reference.flags.contains(ReferenceFlags::LOW_BYTE) {
                    image.write(obj.cartridge_bank, region_start, write_addr, (raddr & 0xFF) as u8);
                }
                if reference.flags.contains(ReferenceFlags::HIGH_BYTE) {
                    let hi_addr = if reference.flags.contains(ReferenceFlags::LOW_BYTE) {
                        write_addr + 1
                    } else {
                        write_addr
                    };
                    image.write(obj.cartridge_bank, region_start, hi_addr, ((raddr >> 8) & 0xFF) as u8);
                }
            }
        }

        image
    }
}

fn addr_at(obj: &LinkerObject, offset: u32) -> u32 {
    obj.address.unwrap() + offset
}
